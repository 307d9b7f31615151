//! Thread-safe in-memory [`TelemetryStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	telemetry::{ConsumptionEvent, StoreError, StoreFuture, TelemetryStore},
	window::TimeWindow,
};

type EventLog = Arc<RwLock<Vec<ConsumptionEvent>>>;

/// Append-only log kept in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryTelemetryStore(EventLog);
impl MemoryTelemetryStore {
	/// Creates a store pre-seeded with `events`, as if they had been appended in order.
	pub fn with_events(events: impl IntoIterator<Item = ConsumptionEvent>) -> Self {
		Self(Arc::new(RwLock::new(events.into_iter().collect())))
	}

	/// Snapshot of every appended event in append order.
	pub fn events(&self) -> Vec<ConsumptionEvent> {
		self.0.read().clone()
	}

	fn append_now(log: EventLog, event: ConsumptionEvent) -> Result<(), StoreError> {
		log.write().push(event);

		Ok(())
	}

	fn load_now(log: EventLog, scope: TimeWindow) -> Vec<ConsumptionEvent> {
		let mut rows = log
			.read()
			.iter()
			.filter(|event| scope.contains(event.occurred_at_ms))
			.cloned()
			.collect::<Vec<_>>();

		rows.sort_by_key(|event| event.occurred_at_ms);

		rows
	}
}
impl TelemetryStore for MemoryTelemetryStore {
	fn append(&self, event: ConsumptionEvent) -> StoreFuture<'_, ()> {
		let log = self.0.clone();

		Box::pin(async move { Self::append_now(log, event) })
	}

	fn load_rows(&self, scope: TimeWindow) -> StoreFuture<'_, Vec<ConsumptionEvent>> {
		let log = self.0.clone();

		Box::pin(async move { Ok(Self::load_now(log, scope)) })
	}
}
