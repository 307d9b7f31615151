//! Crate-level error types shared by the gate, the budget engine, and their collaborators.

// self
use crate::{_prelude::*, telemetry::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exceptional failures surfaced by public APIs.
///
/// Authentication and quota outcomes are never reported through this type; they travel as
/// ordinary [`AdmissionDecision`](crate::budget::AdmissionDecision) values.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; fatal at startup.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The telemetry store could not be reached or answered in time.
	#[error("Telemetry store is unavailable.")]
	StoreUnavailable(
		#[from]
		#[source]
		StoreError,
	),
}
impl Error {
	/// Classifies the error for logging and HTTP mapping.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Config,
			Self::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
		}
	}
}

/// Every failure category the admission core distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// Bad or missing credential; no budget was touched.
	Unauthenticated,
	/// Budget was consulted and the request rejected; state unchanged.
	QuotaExceeded,
	/// No resolvable limit or an invalid setting.
	Config,
	/// The telemetry store could not be reached.
	StoreUnavailable,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Unauthenticated => "unauthenticated",
			ErrorKind::QuotaExceeded => "quota_exceeded",
			ErrorKind::Config => "config",
			ErrorKind::StoreUnavailable => "store_unavailable",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Window granularity label is not one of `minute`, `hour`, `day`.
	#[error("Unknown window granularity `{value}`.")]
	UnknownGranularity {
		/// Offending label.
		value: String,
	},
	/// Neither a subject-specific nor a default limit applies.
	#[error("No budget limit is configured for subject `{subject}` and no default exists.")]
	NoLimit {
		/// Subject that could not be budgeted.
		subject: String,
	},
	/// A setting is present but unusable.
	#[error("Invalid value for `{field}`: {reason}.")]
	InvalidValue {
		/// Dotted configuration path.
		field: &'static str,
		/// Human-readable explanation.
		reason: String,
	},
	/// Configuration document could not be parsed.
	#[error("Configuration is malformed at `{path}`: {message}.")]
	Parse {
		/// Path of the failing field.
		path: String,
		/// Parser message.
		message: String,
	},
	/// A secret required to build a collaborator could not be resolved.
	#[error("Secret `{reference}` could not be resolved from any configured source.")]
	SecretNotFound {
		/// Reference that was looked up.
		reference: String,
	},
	/// A subject identifier failed validation.
	#[error("Subject identifier is invalid.")]
	InvalidSubject(#[from] crate::auth::IdentifierError),
	/// A role set failed validation.
	#[error("Role set is invalid.")]
	InvalidRole(#[from] crate::auth::RoleValidationError),
}
impl From<crate::secret::NotFound> for ConfigError {
	fn from(e: crate::secret::NotFound) -> Self {
		Self::SecretNotFound { reference: e.reference }
	}
}
