//! Redacted secret wrapper for challenges, codes, and key material.

// crates.io
use subtle::ConstantTimeEq;
// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping sensitive material out of logs.
///
/// Equality is constant time so challenge checks do not leak matching prefixes.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns true when the secret holds no characters.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Compares against caller-supplied input in constant time.
	pub fn matches(&self, candidate: &str) -> bool {
		self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
	}
}
impl PartialEq for Secret {
	fn eq(&self, other: &Self) -> bool {
		self.matches(&other.0)
	}
}
impl Eq for Secret {}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = Secret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "Secret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn matches_compares_full_value() {
		let secret = Secret::new("xyz");

		assert!(secret.matches("xyz"));
		assert!(!secret.matches("xy"));
		assert!(!secret.matches("xyzz"));
		assert!(!secret.matches(""));
	}
}
