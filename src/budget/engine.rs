//! The budget state machine.
//!
//! Counters live in a map of per-key slots. The map lock is only held to find or insert a slot;
//! the read-modify-write on a counter happens under that slot's own mutex, so two requests for
//! the same (subject, window) are serialized while different keys never wait on each other.
//! Admitted consumption is handed to the [`TelemetrySink`] while the slot is still locked, which
//! keeps the appended events for a subject in admission order.

// std
use std::{
	collections::hash_map::Entry,
	sync::atomic::{AtomicBool, AtomicI64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	budget::{AdmissionDecision, BudgetCounter, BudgetLimits, CounterState, ReplayReport},
	obs,
	telemetry::{ConsumptionEvent, TelemetrySink, TelemetryStore, with_deadline},
	window::{Granularity, WindowKey, window_for},
};

type CounterKey = (SubjectId, WindowKey);
type Slot = Arc<Mutex<CounterCell>>;
type CounterMap = HashMap<CounterKey, Slot>;

#[derive(Debug)]
struct CounterCell {
	counter: BudgetCounter,
	// Set when the slot leaves the map; holders must look the key up again.
	retired: bool,
}

/// Owns every live budget counter.
pub struct BudgetEngine {
	limits: BudgetLimits,
	granularity: Granularity,
	counters: RwLock<CounterMap>,
	sink: Option<TelemetrySink>,
	swept_through: AtomicI64,
	recovered: AtomicBool,
	resync_guard: AsyncMutex<()>,
}
impl BudgetEngine {
	/// Creates an engine with no counters and no telemetry sink.
	pub fn new(limits: BudgetLimits, granularity: Granularity) -> Self {
		Self {
			limits,
			granularity,
			counters: Default::default(),
			sink: None,
			swept_through: AtomicI64::new(i64::MIN),
			recovered: AtomicBool::new(false),
			resync_guard: AsyncMutex::new(()),
		}
	}

	/// Routes admitted consumption to `sink`.
	pub fn with_sink(mut self, sink: TelemetrySink) -> Self {
		self.sink = Some(sink);

		self
	}

	/// Configured limits.
	pub fn limits(&self) -> &BudgetLimits {
		&self.limits
	}

	/// Configured window granularity.
	pub fn granularity(&self) -> Granularity {
		self.granularity
	}

	/// Returns `true` once a startup replay has completed.
	pub fn is_recovered(&self) -> bool {
		self.recovered.load(Ordering::Acquire)
	}

	/// Charges `amount` to `subject` in the window containing `now_ms` if the budget allows it.
	///
	/// Exhaustion is reported through the returned decision and leaves the counter untouched.
	/// The only error is [`ConfigError::NoLimit`]. A zero `amount` is admitted without changing
	/// state or emitting an event.
	pub fn check_and_consume(
		&self,
		subject: &SubjectId,
		amount: u64,
		now_ms: i64,
	) -> Result<AdmissionDecision, ConfigError> {
		let window_key = window_for(now_ms, self.granularity);

		self.maybe_sweep(window_key, now_ms);

		let limit = self.limits.resolve(subject)?;

		loop {
			let slot = self.slot(subject, window_key, limit);
			let mut cell = slot.lock();

			if cell.retired {
				continue;
			}

			let counter = &mut cell.counter;
			let remaining = counter.remaining();

			match counter.consumed.checked_add(amount) {
				Some(next) if next <= counter.limit => {
					if amount > 0 {
						counter.consumed = next;

						if let Some(sink) = &self.sink {
							sink.submit(ConsumptionEvent {
								subject: subject.clone(),
								window_key,
								amount,
								occurred_at_ms: now_ms,
							});
						}
					}

					return Ok(AdmissionDecision::admitted(counter.remaining()));
				},
				_ => return Ok(AdmissionDecision::rejected(ErrorKind::QuotaExceeded, remaining)),
			}
		}
	}

	/// Accumulates historical rows into the live counters.
	///
	/// Rows are routed by `occurred_at_ms`. Rows whose window has fully elapsed at `now_ms`, and
	/// rows for subjects without a resolvable limit, are skipped. No deduplication happens here;
	/// the store must deliver each row exactly once.
	pub fn rebuild_from_rows(
		&self,
		rows: impl IntoIterator<Item = ConsumptionEvent>,
		now_ms: i64,
	) -> ReplayReport {
		let mut counters = self.counters.write();

		self.accumulate(&mut counters, rows, now_ms)
	}

	/// Startup barrier: loads the current window from `store` and replays it.
	///
	/// Fails with [`Error::StoreUnavailable`] if the store errors or misses `deadline`.
	pub async fn recover(
		&self,
		store: &dyn TelemetryStore,
		now_ms: i64,
		deadline: StdDuration,
	) -> Result<ReplayReport> {
		let _guard = self.resync_guard.lock().await;
		let scope = window_for(now_ms, self.granularity).window();
		let rows = with_deadline("load_rows", deadline, store.load_rows(scope)).await?;
		let report = self.rebuild_from_rows(rows, now_ms);

		self.recovered.store(true, Ordering::Release);
		obs::log_replay_complete(&report);

		Ok(report)
	}

	/// Reconciles the live counters with the current window held by `store`.
	///
	/// Pending appends are flushed first, bounded by `deadline`. A counter is only ever raised to
	/// the replayed total, never lowered, so consumption admitted but not yet appended still counts.
	pub async fn resync(
		&self,
		store: &dyn TelemetryStore,
		now_ms: i64,
		deadline: StdDuration,
	) -> Result<ReplayReport> {
		let _guard = self.resync_guard.lock().await;

		if let Some(sink) = &self.sink {
			// A slow store leaves events queued; the merge below still covers them.
			let _ = tokio::time::timeout(deadline, sink.flush()).await;
		}

		let scope = window_for(now_ms, self.granularity).window();
		let rows = with_deadline("load_rows", deadline, store.load_rows(scope)).await?;
		let mut replayed = CounterMap::new();
		let report = self.accumulate(&mut replayed, rows, now_ms);
		let mut counters = self.counters.write();

		for (key, slot) in replayed {
			match counters.entry(key) {
				Entry::Occupied(live) => {
					let total = slot.lock().counter.consumed;
					let mut cell = live.get().lock();

					cell.counter.consumed = cell.counter.consumed.max(total);
				},
				Entry::Vacant(vacant) => {
					vacant.insert(slot);
				},
			}
		}

		drop(counters);
		obs::log_replay_complete(&report);

		Ok(report)
	}

	/// Drops counters whose window ended at least one full window before `now_ms`.
	///
	/// The immediately preceding window is kept so a request racing the boundary never finds
	/// its counter gone. Returns the number of counters removed.
	pub fn evict_elapsed(&self, now_ms: i64) -> usize {
		let horizon = now_ms.saturating_sub(self.granularity.span_ms());
		let mut counters = self.counters.write();
		let before = counters.len();

		counters.retain(|(_, key), slot| {
			if key.window().has_elapsed_at(horizon) {
				slot.lock().retired = true;

				false
			} else {
				true
			}
		});

		before - counters.len()
	}

	/// State of the counter for `subject` in the window containing `now_ms`.
	pub fn state(&self, subject: &SubjectId, now_ms: i64) -> CounterState {
		self.counter(subject, now_ms).map_or(CounterState::Absent, |c| c.state())
	}

	/// Copy of the counter for `subject` in the window containing `now_ms`, if materialized.
	pub fn counter(&self, subject: &SubjectId, now_ms: i64) -> Option<BudgetCounter> {
		let key = (subject.clone(), window_for(now_ms, self.granularity));
		let slot = self.counters.read().get(&key).cloned()?;
		let cell = slot.lock();

		Some(cell.counter.clone())
	}

	/// Copy of every live counter, ordered by subject then window.
	pub fn snapshot(&self) -> Vec<BudgetCounter> {
		let slots = self.counters.read().values().cloned().collect::<Vec<_>>();
		let mut counters =
			slots.iter().map(|slot| slot.lock().counter.clone()).collect::<Vec<_>>();

		counters.sort_by(|a, b| (&a.subject, a.window_key).cmp(&(&b.subject, b.window_key)));

		counters
	}

	fn slot(&self, subject: &SubjectId, window_key: WindowKey, limit: u64) -> Slot {
		let key = (subject.clone(), window_key);

		if let Some(slot) = self.counters.read().get(&key) {
			return slot.clone();
		}

		self.counters
			.write()
			.entry(key)
			.or_insert_with(|| {
				Arc::new(Mutex::new(CounterCell {
					counter: BudgetCounter::new(subject.clone(), window_key, limit),
					retired: false,
				}))
			})
			.clone()
	}

	fn accumulate(
		&self,
		counters: &mut CounterMap,
		rows: impl IntoIterator<Item = ConsumptionEvent>,
		now_ms: i64,
	) -> ReplayReport {
		let mut report = ReplayReport::default();

		for row in rows {
			let window_key = window_for(row.occurred_at_ms, self.granularity);

			if window_key.window().has_elapsed_at(now_ms) {
				report.skipped_elapsed += 1;

				continue;
			}

			let Ok(limit) = self.limits.resolve(&row.subject) else {
				report.skipped_unbudgeted += 1;

				continue;
			};
			let slot = counters.entry((row.subject.clone(), window_key)).or_insert_with(|| {
				Arc::new(Mutex::new(CounterCell {
					counter: BudgetCounter::new(row.subject.clone(), window_key, limit),
					retired: false,
				}))
			});
			let mut cell = slot.lock();

			cell.counter.consumed = cell.counter.consumed.saturating_add(row.amount);
			report.applied += 1;
		}

		report
	}

	fn maybe_sweep(&self, window_key: WindowKey, now_ms: i64) {
		let start = window_key.start_ms();
		let seen = self.swept_through.load(Ordering::Acquire);

		if start <= seen {
			return;
		}
		if self
			.swept_through
			.compare_exchange(seen, start, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
		{
			self.evict_elapsed(now_ms);
		}
	}
}
impl Debug for BudgetEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BudgetEngine")
			.field("granularity", &self.granularity)
			.field("counters", &self.counters.read().len())
			.field("recovered", &self.is_recovered())
			.finish()
	}
}
