// self
use crate::obs::{AdmissionOutcome, AppendOutcome};

/// Records an admission decision via the global metrics recorder (when enabled).
pub fn record_admission(outcome: AdmissionOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("parapet_admission_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a telemetry append outcome via the global metrics recorder (when enabled).
pub fn record_append(outcome: AppendOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("parapet_telemetry_append_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_callable_without_a_global_recorder() {
		record_admission(AdmissionOutcome::QuotaExceeded);
		record_append(AppendOutcome::Dropped);
	}
}
