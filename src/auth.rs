//! Caller authentication: identifiers, role sets, verification strategies, and the resolver.

pub mod cache;
pub mod caller;
pub mod id;
pub mod resolver;
pub mod role;
pub mod strategy;

pub use cache::*;
pub use caller::*;
pub use id::*;
pub use resolver::*;
pub use role::*;
pub use strategy::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// The credential was missing, malformed, expired, or unknown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("Credential was rejected: {reason}.")]
pub struct Unauthenticated {
	/// Short machine-oriented explanation; never contains credential material.
	pub reason: &'static str,
}
impl Unauthenticated {
	/// Creates a rejection with the provided reason.
	pub const fn new(reason: &'static str) -> Self {
		Self { reason }
	}
}

/// Stable, non-reversible fingerprint of a credential used as a lookup key.
///
/// Base64 (no padding) of the SHA-256 digest, so raw credentials never need to be retained.
pub fn credential_fingerprint(credential: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(credential.as_bytes());

	STANDARD_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn fingerprints_are_stable_and_opaque() {
		let fp = credential_fingerprint("tok-123");

		assert_eq!(fp, credential_fingerprint("tok-123"));
		assert_ne!(fp, credential_fingerprint("tok-124"));
		assert!(!fp.contains("tok-123"));
		assert_eq!(fp.len(), 43);
	}
}
