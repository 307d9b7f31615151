//! Credential verification strategies.
//!
//! Each strategy implements [`CredentialVerifier`]. The [`Authenticator`](crate::auth::Authenticator)
//! consults them in the order they were configured; anonymous access only exists when
//! [`AnonymousFallback`] is registered explicitly.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	auth::{CallerContext, RoleSet, SubjectId, Unauthenticated, credential_fingerprint},
	secret::SecretValue,
};

type HmacSha256 = Hmac<Sha256>;

/// Successful verification result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verified {
	/// Caller identity extracted from the credential.
	pub caller: CallerContext,
	/// Instant the credential stops being valid, if it expires.
	pub expires_at: Option<OffsetDateTime>,
}

/// Capability shared by every authentication strategy.
pub trait CredentialVerifier
where
	Self: Send + Sync,
{
	/// Stable label for logs.
	fn name(&self) -> &'static str;

	/// Verifies `credential` as of `now`.
	fn verify(&self, credential: &str, now: OffsetDateTime) -> Result<Verified, Unauthenticated>;

	/// Whether successful results may be served from the verified-token cache.
	fn is_cacheable(&self) -> bool {
		true
	}
}

/// Opaque bearer tokens looked up in a fixed table.
///
/// Tokens are stored by fingerprint only.
#[derive(Clone, Debug, Default)]
pub struct TokenLookup {
	entries: HashMap<String, Verified>,
}
impl TokenLookup {
	/// Registers a token for `caller`, optionally expiring at `expires_at`.
	pub fn insert(
		&mut self,
		token: impl AsRef<str>,
		caller: CallerContext,
		expires_at: Option<OffsetDateTime>,
	) {
		self.entries.insert(credential_fingerprint(token.as_ref()), Verified { caller, expires_at });
	}

	/// Number of registered tokens.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns `true` when no tokens are registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
impl CredentialVerifier for TokenLookup {
	fn name(&self) -> &'static str {
		"token_lookup"
	}

	fn verify(&self, credential: &str, now: OffsetDateTime) -> Result<Verified, Unauthenticated> {
		if credential.is_empty() {
			return Err(Unauthenticated::new("missing credential"));
		}

		let found = self
			.entries
			.get(&credential_fingerprint(credential))
			.ok_or(Unauthenticated::new("unknown token"))?;

		if found.caller.is_anonymous() {
			return Err(Unauthenticated::new("reserved subject"));
		}
		if found.expires_at.is_some_and(|exp| now >= exp) {
			return Err(Unauthenticated::new("token expired"));
		}

		Ok(found.clone())
	}
}

/// Claims carried by a signed assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Subject identifier.
	pub sub: String,
	/// Granted roles.
	#[serde(default)]
	pub roles: Vec<String>,
	/// Expiry as Unix seconds.
	pub exp: i64,
}

/// HMAC-SHA256 signed assertions of the form `<payload>.<signature>`.
///
/// `payload` is base64url (no padding) JSON [`AssertionClaims`]; `signature` is the base64url MAC
/// over the encoded payload bytes.
#[derive(Clone, Debug)]
pub struct SignedAssertion {
	key: SecretValue,
}
impl SignedAssertion {
	/// Creates a verifier using the shared signing key.
	pub fn new(key: SecretValue) -> Self {
		Self { key }
	}

	/// Encodes and signs `claims` with this verifier's key.
	pub fn sign(&self, claims: &AssertionClaims) -> Result<String, serde_json::Error> {
		let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
		let signature = URL_SAFE_NO_PAD.encode(self.mac(payload.as_bytes()));

		Ok(format!("{payload}.{signature}"))
	}

	fn mac(&self, payload: &[u8]) -> Vec<u8> {
		// HMAC accepts keys of any length.
		let mut mac = match HmacSha256::new_from_slice(self.key.expose().as_bytes()) {
			Ok(mac) => mac,
			Err(_) => return Vec::new(),
		};

		mac.update(payload);

		mac.finalize().into_bytes().to_vec()
	}

	fn decode_claims(payload: &str) -> Result<AssertionClaims, Unauthenticated> {
		let bytes =
			URL_SAFE_NO_PAD.decode(payload).map_err(|_| Unauthenticated::new("malformed payload"))?;
		let mut de = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|_| Unauthenticated::new("malformed claims"))
	}
}
impl CredentialVerifier for SignedAssertion {
	fn name(&self) -> &'static str {
		"signed_assertion"
	}

	fn verify(&self, credential: &str, now: OffsetDateTime) -> Result<Verified, Unauthenticated> {
		let (payload, signature) =
			credential.split_once('.').ok_or(Unauthenticated::new("not an assertion"))?;
		let provided = URL_SAFE_NO_PAD
			.decode(signature)
			.map_err(|_| Unauthenticated::new("malformed signature"))?;
		let expected = self.mac(payload.as_bytes());

		if expected.is_empty() || !bool::from(expected.ct_eq(&provided)) {
			return Err(Unauthenticated::new("bad signature"));
		}

		let claims = Self::decode_claims(payload)?;
		let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
			.map_err(|_| Unauthenticated::new("expiry out of range"))?;

		if now >= expires_at {
			return Err(Unauthenticated::new("assertion expired"));
		}

		let subject =
			SubjectId::named(&claims.sub).map_err(|_| Unauthenticated::new("invalid subject"))?;
		let roles = RoleSet::new(claims.roles).map_err(|_| Unauthenticated::new("invalid roles"))?;

		Ok(Verified { caller: CallerContext::new(subject, roles), expires_at: Some(expires_at) })
	}
}

/// Admits requests that carry no credential at all as the anonymous caller.
///
/// A present-but-invalid credential is still rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousFallback;
impl CredentialVerifier for AnonymousFallback {
	fn name(&self) -> &'static str {
		"anonymous"
	}

	fn verify(&self, credential: &str, _: OffsetDateTime) -> Result<Verified, Unauthenticated> {
		if !credential.trim().is_empty() {
			return Err(Unauthenticated::new("credential presented"));
		}

		Ok(Verified { caller: CallerContext::anonymous(), expires_at: None })
	}

	fn is_cacheable(&self) -> bool {
		false
	}
}
