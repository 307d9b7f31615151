//! Interactive terminal prompt source.

// std
use std::io::{self, BufRead, BufReader, Write};
// self
use crate::{
	_prelude::*,
	secret::{SecretSource, SecretValue},
};

type PromptIo = (Box<dyn BufRead + Send>, Box<dyn Write + Send>);

/// Asks an operator to type the secret. Always reports itself as interactive.
pub struct PromptSource {
	io: Mutex<PromptIo>,
}
impl PromptSource {
	/// Prompts on stderr and reads one line from stdin.
	pub fn stdin() -> Self {
		Self::with_io(BufReader::new(io::stdin()), io::stderr())
	}

	/// Prompts on `writer` and reads one line from `reader`.
	pub fn with_io(reader: impl 'static + BufRead + Send, writer: impl 'static + Write + Send) -> Self {
		Self { io: Mutex::new((Box::new(reader), Box::new(writer))) }
	}
}
impl SecretSource for PromptSource {
	fn name(&self) -> &'static str {
		"prompt"
	}

	fn is_interactive(&self) -> bool {
		true
	}

	fn try_resolve(&self, reference: &str) -> Option<SecretValue> {
		let mut guard = self.io.lock();
		let (reader, writer) = &mut *guard;

		write!(writer, "Enter value for `{reference}`: ").ok()?;
		writer.flush().ok()?;

		let mut line = String::new();

		reader.read_line(&mut line).ok()?;

		let value = line.trim_end_matches(['\r', '\n']);

		if value.is_empty() { None } else { Some(SecretValue::new(value)) }
	}
}
impl Debug for PromptSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("PromptSource(..)")
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::io::Cursor;
	// self
	use super::*;

	#[test]
	fn reads_one_line_per_lookup() {
		let source = PromptSource::with_io(Cursor::new("s3cret\n\n"), Vec::new());

		assert!(source.is_interactive());
		assert_eq!(source.try_resolve("db").map(|v| v.expose().to_owned()), Some("s3cret".into()));
		assert!(source.try_resolve("db").is_none(), "An empty line means no value.");
	}
}
