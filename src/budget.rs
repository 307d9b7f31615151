//! Budget engine: windowed per-subject counters, admission decisions, and replay.

pub mod counter;
pub mod engine;
pub mod limits;

pub use counter::*;
pub use engine::*;
pub use limits::*;

// self
use crate::_prelude::*;

/// Allow/reject answer for one request; never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
	/// Whether the request may proceed.
	pub allowed: bool,
	/// Budget left in the current window after this decision.
	pub remaining: u64,
	/// Why the request was rejected; `None` when allowed.
	pub reason: Option<ErrorKind>,
}
impl AdmissionDecision {
	/// An admitted request with `remaining` budget left.
	pub const fn admitted(remaining: u64) -> Self {
		Self { allowed: true, remaining, reason: None }
	}

	/// A rejected request.
	pub const fn rejected(reason: ErrorKind, remaining: u64) -> Self {
		Self { allowed: false, remaining, reason: Some(reason) }
	}

	/// HTTP status class the transport layer should answer with.
	pub const fn status_code(&self) -> u16 {
		match (self.allowed, self.reason) {
			(true, _) => 200,
			(false, Some(ErrorKind::Unauthenticated)) => 401,
			(false, Some(ErrorKind::QuotaExceeded)) => 429,
			(false, _) => 503,
		}
	}
}

/// Summary of a replay pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
	/// Rows accumulated into counters.
	pub applied: usize,
	/// Rows whose window had already elapsed.
	pub skipped_elapsed: usize,
	/// Rows for subjects that no configured limit covers.
	pub skipped_unbudgeted: usize,
}
