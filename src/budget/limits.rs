//! Limit resolution for subjects.

// self
use crate::{_prelude::*, auth::SubjectId};

/// Per-window budget limits.
///
/// Named subjects use their own limit, falling back to the default. The anonymous subject never
/// falls back: it is budgeted only by an explicit anonymous limit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BudgetLimits {
	default: Option<u64>,
	subjects: HashMap<SubjectId, u64>,
	anonymous: Option<u64>,
}
impl BudgetLimits {
	/// Limits where every named subject shares `limit`.
	pub fn with_default(limit: u64) -> Self {
		Self { default: Some(limit), ..Default::default() }
	}

	/// Overrides the limit for one subject.
	pub fn subject(mut self, subject: SubjectId, limit: u64) -> Self {
		if subject.is_anonymous() {
			self.anonymous = Some(limit);
		} else {
			self.subjects.insert(subject, limit);
		}

		self
	}

	/// Sets the budget for anonymous callers.
	pub fn anonymous(mut self, limit: u64) -> Self {
		self.anonymous = Some(limit);

		self
	}

	/// Returns `true` when anonymous callers have a budget at all.
	pub fn admits_anonymous(&self) -> bool {
		self.anonymous.is_some()
	}

	/// Resolves the limit that applies to `subject`.
	pub fn resolve(&self, subject: &SubjectId) -> Result<u64, ConfigError> {
		let limit = if subject.is_anonymous() {
			self.anonymous
		} else {
			self.subjects.get(subject).copied().or(self.default)
		};

		limit.ok_or_else(|| ConfigError::NoLimit { subject: subject.to_string() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn id(value: &str) -> SubjectId {
		SubjectId::new(value).expect("Subject fixture should be valid.")
	}

	#[test]
	fn subject_limits_override_default() {
		let limits = BudgetLimits::with_default(10).subject(id("vip"), 100);

		assert_eq!(limits.resolve(&id("vip")), Ok(100));
		assert_eq!(limits.resolve(&id("alice")), Ok(10));
	}

	#[test]
	fn missing_limit_is_a_config_error() {
		let limits = BudgetLimits::default().subject(id("vip"), 100);

		assert_eq!(
			limits.resolve(&id("alice")),
			Err(ConfigError::NoLimit { subject: "alice".into() })
		);
	}

	#[test]
	fn anonymous_never_inherits_the_default() {
		let limits = BudgetLimits::with_default(10);

		assert!(!limits.admits_anonymous());
		assert!(limits.resolve(&SubjectId::anonymous()).is_err());

		let limits = limits.anonymous(2);

		assert_eq!(limits.resolve(&SubjectId::anonymous()), Ok(2));
	}
}
