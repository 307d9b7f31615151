//! Per-request caller context produced by authentication.

// self
use crate::{
	_prelude::*,
	auth::{RoleSet, SubjectId},
};

/// Identity attached to one inbound request; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerContext {
	/// Unique caller identifier.
	pub subject: SubjectId,
	/// Roles granted to the caller.
	pub roles: RoleSet,
}
impl CallerContext {
	/// Creates a context for the provided subject and roles.
	pub fn new(subject: SubjectId, roles: RoleSet) -> Self {
		Self { subject, roles }
	}

	/// The anonymous caller: subject `anon`, no roles.
	pub fn anonymous() -> Self {
		Self { subject: SubjectId::anonymous(), roles: RoleSet::default() }
	}

	/// Returns `true` if the caller was admitted without a named identity.
	pub fn is_anonymous(&self) -> bool {
		self.subject.is_anonymous()
	}
}
