//! Role sets attached to authenticated callers.

// std
use std::slice::Iter;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError, ser::SerializeSeq};
// self
use crate::_prelude::*;

/// Errors emitted when validating roles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum RoleValidationError {
	/// Empty role names are not allowed.
	#[error("Role names cannot be empty.")]
	Empty,
	/// Roles cannot contain embedded whitespace characters.
	#[error("Role contains whitespace: {role}.")]
	ContainsWhitespace {
		/// The offending role string.
		role: String,
	},
}

/// Normalized set of role names.
///
/// Roles are deduplicated and sorted, so two sets built from the same names in a different order
/// compare, hash, and serialize identically.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleSet(Arc<[String]>);
impl RoleSet {
	/// Creates a normalized role set from any iterator.
	pub fn new<I, S>(roles: I) -> Result<Self, RoleValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = BTreeSet::new();

		for role in roles {
			let owned: String = role.into();

			if owned.is_empty() {
				return Err(RoleValidationError::Empty);
			}
			if owned.chars().any(char::is_whitespace) {
				return Err(RoleValidationError::ContainsWhitespace { role: owned });
			}

			set.insert(owned);
		}

		Ok(Self(Arc::from(set.into_iter().collect::<Vec<_>>())))
	}

	/// Number of distinct roles.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no roles are granted.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the set contains the provided role.
	pub fn contains(&self, role: &str) -> bool {
		self.0.binary_search_by(|candidate| candidate.as_str().cmp(role)).is_ok()
	}

	/// Iterator over roles in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|s| s.as_str())
	}
}
impl Debug for RoleSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("RoleSet").field(&self.0).finish()
	}
}

/// Iterator over role names.
pub struct RoleIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for RoleIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}
impl<'a> IntoIterator for &'a RoleSet {
	type IntoIter = RoleIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		RoleIter { inner: self.0.iter() }
	}
}
impl Serialize for RoleSet {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(self.0.len()))?;

		for role in self.0.iter() {
			seq.serialize_element(role)?;
		}

		seq.end()
	}
}
impl<'de> Deserialize<'de> for RoleSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let values = <Vec<String>>::deserialize(deserializer)?;

		RoleSet::new(values).map_err(DeError::custom)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn insertion_order_is_irrelevant() {
		let lhs = RoleSet::new(["writer", "reader", "reader"]).expect("Roles should be valid.");
		let rhs = RoleSet::new(["reader", "writer"]).expect("Roles should be valid.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.iter().collect::<Vec<_>>(), vec!["reader", "writer"]);
		assert!(lhs.contains("writer"));
		assert!(!lhs.contains("admin"));
	}

	#[test]
	fn invalid_roles_error() {
		assert_eq!(RoleSet::new([""]), Err(RoleValidationError::Empty));
		assert!(matches!(
			RoleSet::new(["has space"]),
			Err(RoleValidationError::ContainsWhitespace { .. })
		));
		assert!(serde_json::from_str::<RoleSet>("[\"ok\", \"\"]").is_err());
	}
}
