//! Live per-(subject, window) counters.

// self
use crate::{_prelude::*, auth::SubjectId, window::WindowKey};

/// Lifecycle of a (subject, window) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterState {
	/// No counter has been materialized.
	Absent,
	/// Counter exists with budget left.
	Active,
	/// Counter has reached or passed its limit.
	Exhausted,
}

/// Aggregate consumption for one subject in one window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCounter {
	/// Subject the counter belongs to.
	pub subject: SubjectId,
	/// Window the counter aggregates.
	pub window_key: WindowKey,
	/// Units consumed so far; never decreases.
	pub consumed: u64,
	/// Limit resolved when the counter was materialized.
	pub limit: u64,
}
impl BudgetCounter {
	/// Fresh counter with nothing consumed.
	pub fn new(subject: SubjectId, window_key: WindowKey, limit: u64) -> Self {
		Self { subject, window_key, consumed: 0, limit }
	}

	/// Budget left, saturating at zero when replay pushed `consumed` past `limit`.
	pub fn remaining(&self) -> u64 {
		self.limit.saturating_sub(self.consumed)
	}

	/// Current state; a materialized counter is never [`CounterState::Absent`].
	pub fn state(&self) -> CounterState {
		if self.consumed >= self.limit { CounterState::Exhausted } else { CounterState::Active }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::window::{Granularity, window_for};

	#[test]
	fn remaining_saturates_and_state_follows() {
		let subject = SubjectId::new("alice").expect("Subject fixture should be valid.");
		let mut counter = BudgetCounter::new(subject, window_for(0, Granularity::Hour), 2);

		assert_eq!(counter.state(), CounterState::Active);

		counter.consumed = 2;

		assert_eq!(counter.state(), CounterState::Exhausted);

		counter.consumed = 5;

		assert_eq!(counter.remaining(), 0);
	}
}
