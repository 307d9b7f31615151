//! Ordered chain of secret sources used to configure collaborators at startup.
//!
//! Sources are consulted strictly in the order they were registered and the first hit wins.
//! Interactive sources declare themselves through [`SecretSource::is_interactive`]; a resolver
//! built for a headless process skips them without ever calling into them.

pub mod env;
pub mod prompt;

pub use env::{EnvSource, normalize};
pub use prompt::PromptSource;

// std
use std::io::IsTerminal;
// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);
impl SecretValue {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for SecretValue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SecretValue").field(&"<redacted>").finish()
	}
}
impl Display for SecretValue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// No configured source produced a value for the reference.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Secret `{reference}` was not found.")]
pub struct NotFound {
	/// Reference that was looked up.
	pub reference: String,
}

/// A single place secrets can come from.
pub trait SecretSource
where
	Self: Send + Sync,
{
	/// Stable label for logs.
	fn name(&self) -> &'static str;

	/// Returns `true` if resolving may block on a human; such sources are never invoked headless.
	fn is_interactive(&self) -> bool {
		false
	}

	/// Looks the reference up, returning `None` when this source has no value for it.
	fn try_resolve(&self, reference: &str) -> Option<SecretValue>;
}

/// Source kinds selectable from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretSourceKind {
	/// Process environment, see [`EnvSource`].
	Env,
	/// Terminal prompt, see [`PromptSource`].
	Prompt,
}

/// Fixed in-memory source, also the seam for vault-style backends populated at startup.
#[derive(Clone, Debug, Default)]
pub struct MapSource(HashMap<String, SecretValue>);
impl MapSource {
	/// Registers a value for an exact reference.
	pub fn insert(&mut self, reference: impl Into<String>, value: impl Into<String>) {
		self.0.insert(reference.into(), SecretValue::new(value));
	}

	/// Builder-style [`MapSource::insert`].
	pub fn with(mut self, reference: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(reference, value);

		self
	}
}
impl SecretSource for MapSource {
	fn name(&self) -> &'static str {
		"map"
	}

	fn try_resolve(&self, reference: &str) -> Option<SecretValue> {
		self.0.get(reference).cloned()
	}
}

/// Resolves secret references against an ordered list of sources.
pub struct SecretResolver {
	sources: Vec<Box<dyn SecretSource>>,
	headless: bool,
}
impl SecretResolver {
	/// Creates an empty resolver; `headless` disables every interactive source.
	pub fn new(headless: bool) -> Self {
		Self { sources: Vec::new(), headless }
	}

	/// Builds the resolver described by configuration, in the listed order.
	pub fn from_kinds(kinds: &[SecretSourceKind], namespace: &str, headless: bool) -> Self {
		kinds.iter().fold(Self::new(headless), |resolver, kind| match kind {
			SecretSourceKind::Env => resolver.with_source(EnvSource::new(namespace)),
			SecretSourceKind::Prompt => resolver.with_source(PromptSource::stdin()),
		})
	}

	/// Returns `true` when stdin is not attached to a terminal.
	pub fn detect_headless() -> bool {
		!std::io::stdin().is_terminal()
	}

	/// Appends a source with the lowest precedence so far.
	pub fn with_source(mut self, source: impl 'static + SecretSource) -> Self {
		self.sources.push(Box::new(source));

		self
	}

	/// Whether interactive sources are suppressed.
	pub fn is_headless(&self) -> bool {
		self.headless
	}

	/// Tries each source in order and returns the first value found.
	pub fn resolve(&self, reference: &str) -> Result<SecretValue, NotFound> {
		for source in &self.sources {
			if source.is_interactive() && self.headless {
				continue;
			}
			if let Some(value) = source.try_resolve(reference) {
				return Ok(value);
			}
		}

		Err(NotFound { reference: reference.to_owned() })
	}
}
impl Debug for SecretResolver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let names = self.sources.iter().map(|s| s.name()).collect::<Vec<_>>();

		f.debug_struct("SecretResolver")
			.field("sources", &names)
			.field("headless", &self.headless)
			.finish()
	}
}
