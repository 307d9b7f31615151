//! Telemetry store contract, consumption events, and the asynchronous append path.

pub mod appender;
pub mod backoff;
pub mod memory;

pub use appender::{AppendPolicy, AppendStats, TelemetryAppender, TelemetrySink};
pub use backoff::RetryPolicy;
pub use memory::MemoryTelemetryStore;

// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	window::{TimeWindow, WindowKey},
};

/// Boxed future returned by [`TelemetryStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// One unit of recorded consumption; immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionEvent {
	/// Caller that consumed budget.
	pub subject: SubjectId,
	/// Window the consumption was charged to.
	pub window_key: WindowKey,
	/// Units consumed.
	pub amount: u64,
	/// Instant of the admission decision, in Unix milliseconds.
	pub occurred_at_ms: i64,
}

/// Durable append log backing budget recovery.
///
/// Replay performs no deduplication: implementations must deliver each appended row exactly
/// once from [`TelemetryStore::load_rows`].
pub trait TelemetryStore
where
	Self: Send + Sync,
{
	/// Durably appends one event.
	fn append(&self, event: ConsumptionEvent) -> StoreFuture<'_, ()>;

	/// Loads every event whose `occurred_at_ms` falls inside `scope`, ideally ordered by time.
	fn load_rows(&self, scope: TimeWindow) -> StoreFuture<'_, Vec<ConsumptionEvent>>;
}

/// Error type produced by [`TelemetryStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend could not be reached or refused the operation.
	#[error("Backend unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// The operation did not finish within its deadline.
	#[error("Store {operation} timed out after {after_ms} ms.")]
	Timeout {
		/// Operation label (`append`, `load_rows`).
		operation: String,
		/// Deadline that elapsed.
		after_ms: u64,
	},
	/// Stored rows could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
}

/// Runs a store future under a deadline, mapping expiry to [`StoreError::Timeout`].
pub async fn with_deadline<T>(
	operation: &'static str,
	deadline: StdDuration,
	fut: StoreFuture<'_, T>,
) -> Result<T, StoreError> {
	match tokio::time::timeout(deadline, fut).await {
		Ok(result) => result,
		Err(_) => Err(StoreError::Timeout {
			operation: operation.to_owned(),
			after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
		}),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::window::{Granularity, window_for};

	struct Stalled;
	impl TelemetryStore for Stalled {
		fn append(&self, _: ConsumptionEvent) -> StoreFuture<'_, ()> {
			Box::pin(std::future::pending())
		}

		fn load_rows(&self, _: TimeWindow) -> StoreFuture<'_, Vec<ConsumptionEvent>> {
			Box::pin(std::future::pending())
		}
	}

	#[tokio::test]
	async fn deadlines_turn_stalls_into_timeouts() {
		let scope = window_for(0, Granularity::Day).window();
		let err = with_deadline("load_rows", StdDuration::from_millis(20), Stalled.load_rows(scope))
			.await
			.expect_err("A stalled store must time out.");

		assert_eq!(err, StoreError::Timeout { operation: "load_rows".into(), after_ms: 20 });
	}

	#[test]
	fn events_serialize_with_textual_window_keys() {
		let event = ConsumptionEvent {
			subject: SubjectId::new("alice").expect("Subject fixture should be valid."),
			window_key: window_for(90_000, Granularity::Minute),
			amount: 2,
			occurred_at_ms: 90_000,
		};
		let payload = serde_json::to_value(&event).expect("Event should serialize.");

		assert_eq!(payload["window_key"], "minute:60000");
		assert_eq!(payload["subject"], "alice");
	}
}
