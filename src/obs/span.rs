// self
use crate::{_prelude::*, budget::ReplayReport, telemetry::StoreError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used by the gate and its startup phases.
#[derive(Clone, Debug)]
pub struct GateSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl GateSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("parapet.gate", stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> GateSpanGuard {
		#[cfg(feature = "tracing")]
		{
			GateSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			GateSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`GateSpan::entered`].
pub struct GateSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for GateSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("GateSpanGuard(..)")
	}
}

/// Logs a finished replay.
pub fn log_replay_complete(report: &ReplayReport) {
	#[cfg(feature = "tracing")]
	tracing::info!(
		applied = report.applied,
		skipped_elapsed = report.skipped_elapsed,
		skipped_unbudgeted = report.skipped_unbudgeted,
		"Budget counters rebuilt from telemetry."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = report;
}

/// Logs a failed append that will be retried after `delay`.
pub fn log_append_retry(subject: &str, attempt: u32, delay: StdDuration, err: &StoreError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		subject,
		attempt,
		delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
		error = %err,
		"Telemetry append failed; retrying."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (subject, attempt, delay, err);
}

/// Logs an event that will never reach the store.
pub fn log_event_dropped(subject: &str, cause: &str) {
	#[cfg(feature = "tracing")]
	tracing::error!(subject, cause, "Consumption event dropped.");
	#[cfg(not(feature = "tracing"))]
	let _ = (subject, cause);
}

/// Logs a configuration or store failure raised while the gate starts or serves a request.
pub fn log_gate_failure(stage: &'static str, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::error!(stage, kind = %err.kind(), error = %err, "Gate failed; refusing traffic.");
	#[cfg(not(feature = "tracing"))]
	let _ = (stage, err);
}

/// Logs a credential that no strategy accepted.
pub fn log_rejected_credential(reason: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(reason, "Credential rejected.");
	#[cfg(not(feature = "tracing"))]
	let _ = reason;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn gate_span_guard_exists_without_subscriber() {
		let _guard = GateSpan::new("test").entered();
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = GateSpan::new("instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
