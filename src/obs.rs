//! Optional observability helpers for the admission path.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit spans named `parapet.gate` with a `stage` field and
//!   structured events for replay, append retries, and dropped telemetry.
//! - Enable `metrics` to increment `parapet_admission_total` (labeled by `outcome`) for every
//!   decision and `parapet_telemetry_append_total` (labeled by `outcome`) for every append.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each admission decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdmissionOutcome {
	/// Budget consumed; request may proceed.
	Admitted,
	/// Rejected because the budget is exhausted.
	QuotaExceeded,
	/// Rejected before the budget was consulted.
	Unauthenticated,
}
impl AdmissionOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AdmissionOutcome::Admitted => "admitted",
			AdmissionOutcome::QuotaExceeded => "quota_exceeded",
			AdmissionOutcome::Unauthenticated => "unauthenticated",
		}
	}
}
impl Display for AdmissionOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each telemetry append attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AppendOutcome {
	/// Event durably accepted by the store.
	Appended,
	/// Attempt failed; another one is scheduled.
	Retried,
	/// Event abandoned (queue full or retries exhausted).
	Dropped,
}
impl AppendOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AppendOutcome::Appended => "appended",
			AppendOutcome::Retried => "retried",
			AppendOutcome::Dropped => "dropped",
		}
	}
}
impl Display for AppendOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
