//! JSON gate configuration.
//!
//! Every section is optional and falls back to its defaults; unknown fields are rejected so a
//! typo never silently disables a setting. Parse failures report the path of the failing field.

// self
use crate::{
	_prelude::*,
	auth::{
		AnonymousFallback, Authenticator, CallerContext, RoleSet, SignedAssertion, SubjectId,
		TokenLookup,
	},
	budget::BudgetLimits,
	secret::{SecretResolver, SecretSourceKind},
	telemetry::{AppendPolicy, RetryPolicy},
	window::{Granularity, datetime_from_ms},
};

/// Top-level configuration consumed by [`RequestGate::bootstrap`](crate::gate::RequestGate::bootstrap).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
	/// Accounting window width.
	pub granularity: Granularity,
	/// Budget limits.
	pub budget: BudgetConfig,
	/// Authentication strategies.
	pub auth: AuthConfig,
	/// Secret sources.
	pub secrets: SecretsConfig,
	/// Telemetry store I/O bounds.
	pub telemetry: TelemetryConfig,
}
impl GateConfig {
	/// Parses and validates a JSON document.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(&mut de).map_err(|e| {
			ConfigError::Parse { path: e.path().to_string(), message: e.inner().to_string() }
		})?;

		de.end().map_err(|e| ConfigError::Parse { path: ".".into(), message: e.to_string() })?;
		config.validate()?;

		Ok(config)
	}

	/// Checks cross-field invariants that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let telemetry = &self.telemetry;

		if telemetry.queue_capacity == 0 {
			return Err(invalid("telemetry.queue_capacity", "must be greater than zero"));
		}
		if telemetry.replay_timeout_ms == 0 {
			return Err(invalid("telemetry.replay_timeout_ms", "must be greater than zero"));
		}
		if telemetry.append_timeout_ms == 0 {
			return Err(invalid("telemetry.append_timeout_ms", "must be greater than zero"));
		}
		if telemetry.retry.max_attempts == 0 {
			return Err(invalid("telemetry.retry.max_attempts", "must be at least 1"));
		}
		if telemetry.retry.base_delay_ms > telemetry.retry.max_delay_ms {
			return Err(invalid("telemetry.retry.base_delay_ms", "must not exceed max_delay_ms"));
		}
		if self.secrets.sources.is_empty() {
			return Err(invalid("secrets.sources", "at least one source is required"));
		}
		if self.auth.cache_ttl_ms > 0 && self.auth.cache_capacity == 0 {
			return Err(invalid("auth.cache_capacity", "must be greater than zero when caching"));
		}
		if self.auth.anonymous_limit.is_some() && !self.auth.allow_anonymous {
			return Err(invalid("auth.anonymous_limit", "requires allow_anonymous"));
		}

		for token in &self.auth.tokens {
			SubjectId::named(&token.subject)?;
			RoleSet::new(token.roles.iter().cloned())?;
		}

		self.budget_limits().map(drop)
	}

	/// Budget limits described by the `budget` and `auth` sections.
	///
	/// Subject keys must be named identities; the anonymous budget comes only from
	/// `auth.anonymous_limit`.
	pub fn budget_limits(&self) -> Result<BudgetLimits, ConfigError> {
		let mut limits = BudgetLimits::default();

		if let Some(limit) = self.budget.default_limit {
			limits = BudgetLimits::with_default(limit);
		}

		for (subject, limit) in &self.budget.subjects {
			limits = limits.subject(SubjectId::named(subject)?, *limit);
		}

		if let (true, Some(limit)) = (self.auth.allow_anonymous, self.auth.anonymous_limit) {
			limits = limits.anonymous(limit);
		}

		Ok(limits)
	}

	/// Builds the authenticator, resolving token values and the assertion key through `secrets`.
	///
	/// Strategies are consulted in a fixed order: token lookup, signed assertion, then the
	/// anonymous fallback when enabled.
	pub fn authenticator(&self, secrets: &SecretResolver) -> Result<Authenticator, ConfigError> {
		let auth = &self.auth;
		let mut builder = Authenticator::builder();

		if !auth.tokens.is_empty() {
			let mut lookup = TokenLookup::default();

			for token in &auth.tokens {
				let value = secrets.resolve(&token.token_ref)?;
				let caller = CallerContext::new(
					SubjectId::named(&token.subject)?,
					RoleSet::new(token.roles.iter().cloned())?,
				);

				lookup.insert(value.expose(), caller, token.expires_at_ms.map(datetime_from_ms));
			}

			builder = builder.strategy(lookup);
		}
		if let Some(reference) = &auth.assertion_key_ref {
			builder = builder.strategy(SignedAssertion::new(secrets.resolve(reference)?));
		}
		if auth.allow_anonymous {
			builder = builder.strategy(AnonymousFallback);
		}
		if auth.cache_ttl_ms > 0 {
			let ttl = Duration::milliseconds(i64::try_from(auth.cache_ttl_ms).unwrap_or(i64::MAX));

			builder = builder.cache(ttl, auth.cache_capacity);
		}

		Ok(builder.build())
	}

	/// Secret resolver described by the `secrets` section.
	///
	/// Headless mode is detected from stdin unless set explicitly.
	pub fn secret_resolver(&self) -> SecretResolver {
		let headless = self.secrets.headless.unwrap_or_else(SecretResolver::detect_headless);

		SecretResolver::from_kinds(&self.secrets.sources, &self.secrets.namespace, headless)
	}

	/// Append worker tuning.
	pub fn append_policy(&self) -> AppendPolicy {
		AppendPolicy {
			append_timeout: StdDuration::from_millis(self.telemetry.append_timeout_ms),
			queue_capacity: self.telemetry.queue_capacity,
			retry: self.telemetry.retry.clone(),
		}
	}

	/// Deadline for the startup replay.
	pub fn replay_timeout(&self) -> StdDuration {
		StdDuration::from_millis(self.telemetry.replay_timeout_ms)
	}
}
impl FromStr for GateConfig {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_json_str(s)
	}
}

/// `budget` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
	/// Limit for named subjects without an override.
	pub default_limit: Option<u64>,
	/// Per-subject overrides.
	pub subjects: BTreeMap<String, u64>,
}

/// `auth` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
	/// Registers the anonymous fallback strategy.
	pub allow_anonymous: bool,
	/// Budget for the anonymous subject; without it anonymous callers are rejected.
	pub anonymous_limit: Option<u64>,
	/// Secret reference for the signed-assertion key; enables that strategy when set.
	pub assertion_key_ref: Option<String>,
	/// Static bearer tokens.
	pub tokens: Vec<TokenConfig>,
	/// Verified-credential cache lifetime; `0` disables the cache.
	pub cache_ttl_ms: u64,
	/// Maximum cached credentials.
	pub cache_capacity: usize,
}
impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			allow_anonymous: false,
			anonymous_limit: None,
			assertion_key_ref: None,
			tokens: Vec::new(),
			cache_ttl_ms: 60_000,
			cache_capacity: 1_024,
		}
	}
}

/// One static bearer token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
	/// Secret reference holding the token value.
	pub token_ref: String,
	/// Subject the token authenticates as.
	pub subject: String,
	/// Roles granted to the subject.
	#[serde(default)]
	pub roles: Vec<String>,
	/// Expiry in Unix milliseconds.
	#[serde(default)]
	pub expires_at_ms: Option<i64>,
}

/// `secrets` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecretsConfig {
	/// Sources in precedence order.
	pub sources: Vec<SecretSourceKind>,
	/// Prefix for namespaced environment lookups.
	pub namespace: String,
	/// Forces headless mode on or off.
	pub headless: Option<bool>,
}
impl Default for SecretsConfig {
	fn default() -> Self {
		Self { sources: vec![SecretSourceKind::Env], namespace: "PARAPET".into(), headless: None }
	}
}

/// `telemetry` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
	/// Startup replay deadline.
	pub replay_timeout_ms: u64,
	/// Per-attempt append deadline.
	pub append_timeout_ms: u64,
	/// Append queue bound.
	pub queue_capacity: usize,
	/// Append retry schedule.
	pub retry: RetryPolicy,
}
impl Default for TelemetryConfig {
	fn default() -> Self {
		Self {
			replay_timeout_ms: 10_000,
			append_timeout_ms: 2_000,
			queue_capacity: 4_096,
			retry: RetryPolicy::default(),
		}
	}
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
	ConfigError::InvalidValue { field, reason: reason.into() }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::secret::MapSource;

	#[test]
	fn empty_document_uses_defaults() {
		let config = GateConfig::from_json_str("{}").expect("Empty config should parse.");

		assert_eq!(config, GateConfig::default());
		assert_eq!(config.granularity, Granularity::Day);
		assert_eq!(config.replay_timeout(), StdDuration::from_secs(10));
		assert_eq!(config.append_policy(), AppendPolicy::default());
		assert_eq!(config.secrets.namespace, "PARAPET");
	}

	#[test]
	fn parse_errors_carry_the_failing_path() {
		let err = GateConfig::from_json_str(r#"{"budget":{"default_limit":"ten"}}"#)
			.expect_err("String limits must be rejected.");

		assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == "budget.default_limit"));

		let err = GateConfig::from_json_str(r#"{"granularity":"weekly"}"#)
			.expect_err("Unknown granularity must be rejected.");

		assert!(matches!(err, ConfigError::Parse { ref message, .. } if message.contains("weekly")));
		assert!(GateConfig::from_json_str(r#"{"budgets":{}}"#).is_err());
	}

	#[test]
	fn validation_rejects_unusable_values() {
		let err = GateConfig::from_json_str(r#"{"telemetry":{"queue_capacity":0}}"#)
			.expect_err("Zero capacity must be rejected.");

		assert_eq!(err, invalid("telemetry.queue_capacity", "must be greater than zero"));

		let err = GateConfig::from_json_str(r#"{"budget":{"subjects":{"anon":5}}}"#)
			.expect_err("The anonymous subject cannot be budgeted by name.");

		assert!(matches!(err, ConfigError::InvalidSubject(_)));
		assert!(GateConfig::from_json_str(r#"{"auth":{"anonymous_limit":1}}"#).is_err());
	}

	#[test]
	fn limits_follow_budget_and_auth_sections() {
		let config = GateConfig::from_json_str(
			r#"{
				"granularity": "hour",
				"budget": { "default_limit": 10, "subjects": { "vip": 100 } },
				"auth": { "allow_anonymous": true, "anonymous_limit": 2 }
			}"#,
		)
		.expect("Config should parse.");
		let limits = config.budget_limits().expect("Limits should build.");
		let id = |v: &str| SubjectId::new(v).expect("Subject fixture should be valid.");

		assert_eq!(limits.resolve(&id("vip")), Ok(100));
		assert_eq!(limits.resolve(&id("alice")), Ok(10));
		assert_eq!(limits.resolve(&SubjectId::anonymous()), Ok(2));
	}

	#[test]
	fn authenticator_resolves_token_refs_through_secrets() {
		let config = GateConfig::from_json_str(
			r#"{
				"auth": {
					"allow_anonymous": true,
					"assertion_key_ref": "signing_key_ref",
					"tokens": [{ "token_ref": "alice_token_ref", "subject": "alice", "roles": ["reader"] }]
				}
			}"#,
		)
		.expect("Config should parse.");
		let secrets = SecretResolver::new(true).with_source(
			MapSource::default()
				.with("alice_token_ref", "t-alice")
				.with("signing_key_ref", "k-signing"),
		);
		let authenticator = config.authenticator(&secrets).expect("Secrets should resolve.");

		assert_eq!(
			authenticator.strategy_names(),
			vec!["token_lookup", "signed_assertion", "anonymous"]
		);

		let caller = authenticator.authenticate("t-alice").expect("Configured token should verify.");

		assert_eq!(caller.subject.as_ref(), "alice");
		assert!(caller.roles.contains("reader"));
		assert!(authenticator.authenticate("").expect("Anonymous is enabled.").is_anonymous());
	}

	#[test]
	fn missing_secret_is_a_config_error() {
		let config = GateConfig::from_json_str(
			r#"{"auth":{"tokens":[{"token_ref":"ghost_ref","subject":"ghost"}]}}"#,
		)
		.expect("Config should parse.");
		let err = config
			.authenticator(&SecretResolver::new(true))
			.expect_err("Unresolvable token refs must fail.");

		assert_eq!(err, ConfigError::SecretNotFound { reference: "ghost_ref".into() });
	}
}
