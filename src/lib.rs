//! Request admission core: authenticate callers, meter them against rolling time-window budgets,
//! and rebuild live counters from a telemetry log after a restart.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod budget;
pub mod config;
pub mod error;
pub mod gate;
pub mod obs;
pub mod secret;
pub mod telemetry;
pub mod window;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{Authenticator, CallerContext, RoleSet, SubjectId, TokenLookup},
		budget::{BudgetEngine, BudgetLimits},
		telemetry::{ConsumptionEvent, MemoryTelemetryStore},
		window::{Granularity, window_for},
	};

	/// Fixed instant (2025-11-10T12:00:00Z) used as "now" across tests.
	pub const TEST_NOW_MS: i64 = 1_762_776_000_000;

	/// Builds a subject identifier, panicking on invalid fixtures.
	pub fn subject(value: &str) -> SubjectId {
		SubjectId::new(value).expect("Subject fixture should be valid.")
	}

	/// Builds a daily-window engine where every named subject shares `default_limit`.
	pub fn test_engine(default_limit: u64) -> BudgetEngine {
		BudgetEngine::new(BudgetLimits::with_default(default_limit), Granularity::Day)
	}

	/// Builds an authenticator that only knows the provided `(token, subject)` pairs.
	pub fn test_authenticator(tokens: &[(&str, &str)]) -> Authenticator {
		let mut lookup = TokenLookup::default();

		for (token, who) in tokens {
			lookup.insert(*token, CallerContext::new(subject(who), RoleSet::default()), None);
		}

		Authenticator::builder().strategy(lookup).build()
	}

	/// Builds a daily-window consumption event for `who` at `occurred_at_ms`.
	pub fn test_event(who: &str, amount: u64, occurred_at_ms: i64) -> ConsumptionEvent {
		ConsumptionEvent {
			subject: subject(who),
			window_key: window_for(occurred_at_ms, Granularity::Day),
			amount,
			occurred_at_ms,
		}
	}

	/// Builds an in-memory store pre-seeded with `events`.
	pub fn seeded_store(events: impl IntoIterator<Item = ConsumptionEvent>) -> Arc<MemoryTelemetryStore> {
		Arc::new(MemoryTelemetryStore::with_events(events))
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{ConfigError, Error, ErrorKind, Result};
}

#[cfg(test)] use color_eyre as _;
