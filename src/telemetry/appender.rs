//! Fire-and-forget append path between admission decisions and the telemetry store.
//!
//! Decisions hand events to a [`TelemetrySink`], which only ever enqueues. A single worker task
//! drains the queue in FIFO order, so events for one subject reach the store in the order they
//! were admitted. Failed attempts are retried with [`RetryPolicy`] backoff; an event that still
//! fails, or that finds the queue full, is dropped and logged. Admission never waits on any of it.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::{
	sync::{
		mpsc::{self, error::TrySendError},
		oneshot,
	},
	task::JoinHandle,
};
// self
use crate::{
	_prelude::*,
	obs::{self, AppendOutcome},
	telemetry::{ConsumptionEvent, RetryPolicy, TelemetryStore, with_deadline},
};

/// Tuning for the append worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendPolicy {
	/// Deadline for a single append attempt.
	pub append_timeout: StdDuration,
	/// Maximum queued events before new ones are dropped. Must be non-zero.
	pub queue_capacity: usize,
	/// Retry schedule for failed attempts.
	pub retry: RetryPolicy,
}
impl Default for AppendPolicy {
	fn default() -> Self {
		Self {
			append_timeout: StdDuration::from_secs(2),
			queue_capacity: 4_096,
			retry: RetryPolicy::default(),
		}
	}
}

/// Thread-safe counters for append outcomes.
#[derive(Debug, Default)]
pub struct AppendStats {
	appended: AtomicU64,
	retried: AtomicU64,
	dropped: AtomicU64,
}
impl AppendStats {
	/// Events durably accepted by the store.
	pub fn appended(&self) -> u64 {
		self.appended.load(Ordering::Relaxed)
	}

	/// Failed attempts that were rescheduled.
	pub fn retried(&self) -> u64 {
		self.retried.load(Ordering::Relaxed)
	}

	/// Events abandoned because the queue was full or retries ran out.
	pub fn dropped(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}

	fn record(&self, outcome: AppendOutcome) {
		let counter = match outcome {
			AppendOutcome::Appended => &self.appended,
			AppendOutcome::Retried => &self.retried,
			AppendOutcome::Dropped => &self.dropped,
		};

		counter.fetch_add(1, Ordering::Relaxed);
		obs::record_append(outcome);
	}
}

enum Command {
	Append(ConsumptionEvent),
	Flush(oneshot::Sender<()>),
}

/// Cloneable handle used to submit events to the append worker.
#[derive(Clone)]
pub struct TelemetrySink {
	tx: mpsc::Sender<Command>,
	stats: Arc<AppendStats>,
}
impl TelemetrySink {
	/// Enqueues `event` without waiting; returns `false` if it was dropped.
	pub fn submit(&self, event: ConsumptionEvent) -> bool {
		match self.tx.try_send(Command::Append(event)) {
			Ok(()) => true,
			Err(TrySendError::Full(command)) => {
				self.reject(command, "queue full");

				false
			},
			Err(TrySendError::Closed(command)) => {
				self.reject(command, "appender stopped");

				false
			},
		}
	}

	/// Resolves once every event submitted before this call has been appended or dropped.
	pub async fn flush(&self) {
		let (done, wait) = oneshot::channel();

		if self.tx.send(Command::Flush(done)).await.is_ok() {
			let _ = wait.await;
		}
	}

	/// Outcome counters shared with the worker.
	pub fn stats(&self) -> &AppendStats {
		&self.stats
	}

	fn reject(&self, command: Command, cause: &str) {
		match command {
			Command::Append(event) => {
				obs::log_event_dropped(&event.subject, cause);
				self.stats.record(AppendOutcome::Dropped);
			},
			// Nothing is left to wait for once the worker cannot take the request.
			Command::Flush(done) => {
				let _ = done.send(());
			},
		}
	}
}
impl Debug for TelemetrySink {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TelemetrySink").field("stats", &self.stats).finish()
	}
}

/// Owns the background worker that drains a [`TelemetrySink`] into a [`TelemetryStore`].
#[derive(Debug)]
pub struct TelemetryAppender {
	sink: TelemetrySink,
	worker: JoinHandle<()>,
}
impl TelemetryAppender {
	/// Spawns the worker on the current Tokio runtime.
	pub fn spawn(store: Arc<dyn TelemetryStore>, policy: AppendPolicy) -> Self {
		let (tx, rx) = mpsc::channel(policy.queue_capacity.max(1));
		let stats = Arc::new(AppendStats::default());
		let worker = tokio::spawn(run(store, rx, policy, stats.clone()));

		Self { sink: TelemetrySink { tx, stats }, worker }
	}

	/// Returns a handle for submitting events.
	pub fn sink(&self) -> TelemetrySink {
		self.sink.clone()
	}

	/// Drains everything submitted so far, then stops the worker.
	///
	/// Events submitted through surviving sinks afterwards are dropped.
	pub async fn close(self) {
		self.sink.flush().await;
		self.worker.abort();

		let _ = self.worker.await;
	}
}

async fn run(
	store: Arc<dyn TelemetryStore>,
	mut rx: mpsc::Receiver<Command>,
	policy: AppendPolicy,
	stats: Arc<AppendStats>,
) {
	while let Some(command) = rx.recv().await {
		match command {
			Command::Append(event) => deliver(store.as_ref(), event, &policy, &stats).await,
			Command::Flush(done) => {
				let _ = done.send(());
			},
		}
	}
}

async fn deliver(
	store: &dyn TelemetryStore,
	event: ConsumptionEvent,
	policy: &AppendPolicy,
	stats: &AppendStats,
) {
	let max_attempts = policy.retry.max_attempts.max(1);
	let mut attempt = 0;

	loop {
		attempt += 1;

		let err =
			match with_deadline("append", policy.append_timeout, store.append(event.clone())).await {
				Ok(()) => {
					stats.record(AppendOutcome::Appended);

					return;
				},
				Err(err) => err,
			};

		if attempt >= max_attempts {
			obs::log_event_dropped(&event.subject, "retries exhausted");
			stats.record(AppendOutcome::Dropped);

			return;
		}

		let delay = policy.retry.delay_for(attempt - 1);

		obs::log_append_retry(&event.subject, attempt, delay, &err);
		stats.record(AppendOutcome::Retried);
		tokio::time::sleep(delay).await;
	}
}
