//! Strongly typed caller identifiers.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Subject reserved for callers admitted by the anonymous strategy.
pub const ANONYMOUS_SUBJECT: &str = "anon";

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Subject identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Subject identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Subject identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
	/// The identifier is reserved for the anonymous caller.
	#[error("Subject identifier `anon` is reserved.")]
	Reserved,
}

/// Unique caller identifier used as the budget key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);
impl SubjectId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Like [`SubjectId::new`] but refuses the reserved anonymous subject.
	pub fn named(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let id = Self::new(value)?;

		if id.is_anonymous() {
			return Err(IdentifierError::Reserved);
		}

		Ok(id)
	}

	/// The distinguished anonymous subject.
	pub fn anonymous() -> Self {
		Self(ANONYMOUS_SUBJECT.to_owned())
	}

	/// Returns `true` for the anonymous subject.
	pub fn is_anonymous(&self) -> bool {
		self.0 == ANONYMOUS_SUBJECT
	}
}
impl Deref for SubjectId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for SubjectId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<SubjectId> for String {
	fn from(value: SubjectId) -> Self {
		value.0
	}
}
impl TryFrom<String> for SubjectId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Borrow<str> for SubjectId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for SubjectId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Subject({})", self.0)
	}
}
impl Display for SubjectId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for SubjectId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace);
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn subjects_validate() {
		assert!(SubjectId::new(" alice").is_err(), "Leading whitespace must be rejected.");
		assert!(SubjectId::new("").is_err());
		assert!(SubjectId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());

		let alice = SubjectId::new("alice").expect("Subject fixture should be considered valid.");

		assert_eq!(alice.as_ref(), "alice");
		assert!(!alice.is_anonymous());
	}

	#[test]
	fn anonymous_subject_is_reserved_for_named_callers() {
		assert!(SubjectId::anonymous().is_anonymous());
		assert_eq!(SubjectId::named(ANONYMOUS_SUBJECT), Err(IdentifierError::Reserved));
		assert!(SubjectId::new(ANONYMOUS_SUBJECT).is_ok());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let subject: SubjectId =
			serde_json::from_str("\"svc-42\"").expect("Subject should deserialize successfully.");

		assert_eq!(subject.as_ref(), "svc-42");
		assert!(serde_json::from_str::<SubjectId>("\"with space\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<SubjectId, u64> = HashMap::from_iter([(
			SubjectId::new("alice").expect("Subject used for lookup should be valid."),
			7_u64,
		)]);

		assert_eq!(map.get("alice"), Some(&7));
	}
}
