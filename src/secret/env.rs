//! Environment-variable secret source with reference normalization.

// self
use crate::{
	_prelude::*,
	secret::{SecretSource, SecretValue},
};

const LITERAL_PREFIX: &str = "ENV:";
const REFERENCE_SUFFIX: &str = "_ref";

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Reads secrets from environment variables.
///
/// Precedence for a reference:
/// 1. `ENV:<NAME>` reads the literal variable `<NAME>`.
/// 2. Otherwise the [normalized](normalize) name is tried bare.
/// 3. Then the normalized name under the namespace, e.g. `PARAPET_API_KEY`.
pub struct EnvSource {
	namespace: String,
	lookup: Box<Lookup>,
}
impl EnvSource {
	/// Creates a source backed by the process environment.
	pub fn new(namespace: impl Into<String>) -> Self {
		Self::with_lookup(namespace, |name| std::env::var(name).ok())
	}

	/// Creates a source backed by a custom variable lookup.
	pub fn with_lookup(
		namespace: impl Into<String>,
		lookup: impl 'static + Fn(&str) -> Option<String> + Send + Sync,
	) -> Self {
		Self { namespace: normalize(&namespace.into()), lookup: Box::new(lookup) }
	}

	/// Candidate variable names for a reference, in lookup order.
	pub fn candidates(&self, reference: &str) -> Vec<String> {
		if let Some(literal) = reference.strip_prefix(LITERAL_PREFIX) {
			return vec![literal.to_owned()];
		}

		let bare = normalize(reference);

		if self.namespace.is_empty() || bare.starts_with(&format!("{}_", self.namespace)) {
			return vec![bare];
		}

		let namespaced = format!("{}_{bare}", self.namespace);

		vec![bare, namespaced]
	}

	fn read(&self, name: &str) -> Option<SecretValue> {
		(self.lookup)(name).filter(|value| !value.is_empty()).map(SecretValue::new)
	}
}
impl SecretSource for EnvSource {
	fn name(&self) -> &'static str {
		"env"
	}

	fn try_resolve(&self, reference: &str) -> Option<SecretValue> {
		self.candidates(reference).iter().find_map(|name| self.read(name))
	}
}
impl Debug for EnvSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EnvSource").field("namespace", &self.namespace).finish()
	}
}

/// Converts a secret reference into an environment variable name.
///
/// Strips one trailing lowercase `_ref`, maps every non-alphanumeric character to `_`, and
/// uppercases. The output only contains `[A-Z0-9_]`, so applying it again is a no-op.
pub fn normalize(reference: &str) -> String {
	let trimmed = reference.strip_suffix(REFERENCE_SUFFIX).unwrap_or(reference);

	trimmed
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
		.collect()
}
