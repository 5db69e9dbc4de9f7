//! Random identifiers, challenges, quick-connect codes, and PKCE material.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::Secret};

const CHALLENGE_BYTES: usize = 64;
const PKCE_VERIFIER_LEN: usize = 64;
const CODE_GROUP_LEN: usize = 4;

/// Generates a random alphanumeric string of the requested length.
pub fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

/// Generates a high-entropy challenge: 64 random bytes, base64url without padding.
pub fn generate_challenge() -> Secret {
	let mut bytes = [0_u8; CHALLENGE_BYTES];

	rand::rng().fill(&mut bytes[..]);

	Secret::new(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generates a human-enterable code shaped like `ABCD-1234-EFGH`.
pub fn generate_quick_code() -> String {
	let mut rng = rand::rng();
	let mut group = |alphabet: &[u8]| -> String {
		(0..CODE_GROUP_LEN)
			.map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
			.collect()
	};
	let head = group(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");
	let digits = group(b"0123456789");
	let tail = group(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");

	format!("{head}-{digits}-{tail}")
}

/// Normalizes user-typed quick-connect codes (surrounding whitespace, case).
pub fn normalize_quick_code(input: &str) -> String {
	input.trim().to_ascii_uppercase()
}

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// PKCE verifier plus the derived challenge sent on the authorize URL.
#[derive(Clone)]
pub struct PkcePair {
	verifier: Secret,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	/// Generates a new S256 pair.
	pub fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier: Secret::new(verifier), challenge, method: PkceCodeChallengeMethod::S256 }
	}

	/// Secret verifier replayed during the code exchange.
	pub fn verifier(&self) -> &Secret {
		&self.verifier
	}

	/// Public challenge derived from the verifier.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method.
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &self.verifier)
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn quick_codes_follow_letter_digit_letter_groups() {
		for _ in 0..32 {
			let code = generate_quick_code();
			let groups = code.split('-').collect::<Vec<_>>();

			assert_eq!(groups.len(), 3, "Code `{code}` should have three groups.");
			assert!(groups[0].chars().all(|c| c.is_ascii_uppercase()));
			assert!(groups[1].chars().all(|c| c.is_ascii_digit()));
			assert!(groups[2].chars().all(|c| c.is_ascii_uppercase()));
			assert!(groups.iter().all(|group| group.len() == CODE_GROUP_LEN));
		}
	}

	#[test]
	fn normalize_trims_and_uppercases() {
		assert_eq!(normalize_quick_code("  abcd-1234-efgh\n"), "ABCD-1234-EFGH");
	}

	#[test]
	fn challenge_is_unpadded_base64url_of_64_bytes() {
		let challenge = generate_challenge();
		let decoded = URL_SAFE_NO_PAD
			.decode(challenge.expose())
			.expect("Challenge should decode as base64url.");

		assert_eq!(decoded.len(), CHALLENGE_BYTES);
		assert_ne!(challenge, generate_challenge());
	}

	#[test]
	fn pkce_challenge_matches_rfc_7636_vector() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);

		let pair = PkcePair::generate();

		assert_eq!(pair.challenge(), compute_pkce_challenge(pair.verifier().expose()));
		assert_eq!(pair.method().as_str(), "S256");
	}
}
