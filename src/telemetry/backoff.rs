//! Exponential backoff for failed telemetry appends.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Retry schedule for append attempts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
	/// Delay before the first retry.
	pub base_delay_ms: u64,
	/// Upper bound for any single delay.
	pub max_delay_ms: u64,
	/// Total attempts per event, including the first one.
	pub max_attempts: u32,
	/// Randomizes each delay within `[delay / 2, delay]`.
	pub jitter: bool,
}
impl RetryPolicy {
	/// Delay to wait before retry number `retry` (zero-based).
	pub fn delay_for(&self, retry: u32) -> StdDuration {
		let factor = 1_u64.checked_shl(retry).unwrap_or(u64::MAX);
		let capped = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
		let millis = if self.jitter && capped > 1 {
			rand::rng().random_range(capped / 2..=capped)
		} else {
			capped
		};

		StdDuration::from_millis(millis)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { base_delay_ms: 100, max_delay_ms: 5_000, max_attempts: 5, jitter: true }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn delays_double_then_cap() {
		let policy = RetryPolicy { jitter: false, ..Default::default() };
		let delays = (0..8).map(|n| policy.delay_for(n).as_millis()).collect::<Vec<_>>();

		assert_eq!(delays, vec![100, 200, 400, 800, 1_600, 3_200, 5_000, 5_000]);
		assert_eq!(policy.delay_for(200), StdDuration::from_millis(5_000));
	}

	#[test]
	fn jitter_stays_within_half_to_full_delay() {
		let policy = RetryPolicy::default();

		for retry in 0..6 {
			let upper = RetryPolicy { jitter: false, ..policy.clone() }.delay_for(retry);
			let delay = policy.delay_for(retry);

			assert!(delay <= upper && delay >= upper / 2, "retry {retry}: {delay:?} vs {upper:?}");
		}
	}
}
