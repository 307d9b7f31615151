//! Ordered strategy chain that turns a credential into a [`CallerContext`].

// self
use crate::{
	_prelude::*,
	auth::{
		CallerContext, CredentialVerifier, Unauthenticated, VerifiedCache, credential_fingerprint,
	},
};

/// Maps inbound credentials to callers.
///
/// Side-effect free from the caller's point of view; the only internal state is the optional
/// [`VerifiedCache`].
pub struct Authenticator {
	strategies: Vec<Box<dyn CredentialVerifier>>,
	cache: Option<VerifiedCache>,
}
impl Authenticator {
	/// Starts an empty builder.
	pub fn builder() -> AuthenticatorBuilder {
		AuthenticatorBuilder::default()
	}

	/// Authenticates against the current wall clock.
	pub fn authenticate(&self, credential: &str) -> Result<CallerContext, Unauthenticated> {
		self.authenticate_at(credential, OffsetDateTime::now_utc())
	}

	/// Authenticates as of `now`; the first strategy that accepts wins.
	pub fn authenticate_at(
		&self,
		credential: &str,
		now: OffsetDateTime,
	) -> Result<CallerContext, Unauthenticated> {
		let fingerprint = (!credential.is_empty()).then(|| credential_fingerprint(credential));

		if let (Some(cache), Some(fp)) = (&self.cache, &fingerprint) {
			if let Some(caller) = cache.get(fp, now) {
				return Ok(caller);
			}
		}

		for strategy in &self.strategies {
			let Ok(verified) = strategy.verify(credential, now) else {
				continue;
			};

			if let (Some(cache), Some(fp)) = (&self.cache, &fingerprint) {
				if strategy.is_cacheable() {
					cache.put(fp.clone(), &verified, now);
				}
			}

			return Ok(verified.caller);
		}

		Err(if credential.is_empty() {
			Unauthenticated::new("missing credential")
		} else {
			Unauthenticated::new("no strategy accepted the credential")
		})
	}

	/// Names of the configured strategies, in evaluation order.
	pub fn strategy_names(&self) -> Vec<&'static str> {
		self.strategies.iter().map(|s| s.name()).collect()
	}
}
impl Debug for Authenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator")
			.field("strategies", &self.strategy_names())
			.field("cache", &self.cache.is_some())
			.finish()
	}
}

/// Builder for [`Authenticator`].
#[derive(Default)]
pub struct AuthenticatorBuilder {
	strategies: Vec<Box<dyn CredentialVerifier>>,
	cache: Option<VerifiedCache>,
}
impl AuthenticatorBuilder {
	/// Appends a strategy with the lowest precedence so far.
	pub fn strategy(mut self, strategy: impl 'static + CredentialVerifier) -> Self {
		self.strategies.push(Box::new(strategy));

		self
	}

	/// Enables the verified-credential cache.
	pub fn cache(mut self, ttl: Duration, capacity: usize) -> Self {
		self.cache = (ttl.is_positive() && capacity > 0).then(|| VerifiedCache::new(ttl, capacity));

		self
	}

	/// Finishes the chain.
	pub fn build(self) -> Authenticator {
		Authenticator { strategies: self.strategies, cache: self.cache }
	}
}
