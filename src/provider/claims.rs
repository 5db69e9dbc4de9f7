//! Verified identity claims and ID-token verification.

// crates.io
use jsonwebtoken::{
	DecodingKey, Validation,
	jwk::{Jwk, JwkSet},
};
// self
use crate::{_prelude::*, error::ProviderError, provider::ProviderDescriptor};

/// Identity attributes decoded from a verified ID token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderClaims {
	/// Provider-scoped subject identifier (`sub`).
	#[serde(rename = "sub", default)]
	pub subject: String,
	/// Email address asserted by the provider.
	#[serde(default)]
	pub email: String,
	/// Full name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Display name, when the provider distinguishes it from `name`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	/// Avatar URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub picture: Option<String>,
}
impl ProviderClaims {
	/// Returns the display name, falling back to the name and finally the email.
	pub fn preferred_display_name(&self) -> &str {
		[self.display_name.as_deref(), self.name.as_deref()]
			.into_iter()
			.flatten()
			.find(|value| !value.trim().is_empty())
			.unwrap_or(self.email.as_str())
	}
}

/// Verifies `raw` against the provider key set and decodes its claims.
///
/// The algorithm must be one the provider advertises, the audience must be `client_id`, and
/// the issuer must be the discovered issuer. `sub` and `email` are required.
pub(crate) fn verify_id_token(
	raw: &str,
	keys: &JwkSet,
	descriptor: &ProviderDescriptor,
	client_id: &str,
) -> Result<ProviderClaims, ProviderError> {
	let header = jsonwebtoken::decode_header(raw).map_err(ProviderError::IdToken)?;

	if !descriptor.accepts(header.alg) {
		return Err(ProviderError::UnsupportedAlgorithm { algorithm: format!("{:?}", header.alg) });
	}

	let jwk = select_key(keys, header.kid.as_deref())?;
	let key = DecodingKey::from_jwk(jwk).map_err(ProviderError::IdToken)?;
	let mut validation = Validation::new(header.alg);

	validation.set_audience(&[client_id]);
	validation.set_issuer(&[descriptor.issuer.as_str()]);

	let claims = jsonwebtoken::decode::<ProviderClaims>(raw, &key, &validation)
		.map_err(ProviderError::IdToken)?
		.claims;

	if claims.subject.is_empty() {
		return Err(ProviderError::MissingClaim { claim: "sub" });
	}
	if claims.email.is_empty() {
		return Err(ProviderError::MissingClaim { claim: "email" });
	}

	Ok(claims)
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, ProviderError> {
	match kid {
		Some(kid) => keys.find(kid).ok_or_else(|| ProviderError::UnknownSigningKey { kid: kid.into() }),
		// Tokens without `kid` are only accepted from single-key sets.
		None => match keys.keys.as_slice() {
			[only] => Ok(only),
			_ => Err(ProviderError::UnknownSigningKey { kid: String::new() }),
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use jsonwebtoken::{Algorithm, EncodingKey, Header};
	// self
	use super::*;
	use crate::auth::ProviderId;

	const SECRET: &[u8] = b"provider-signing-key-for-tests";

	fn descriptor(algorithms: &[Algorithm]) -> ProviderDescriptor {
		let url = |value: &str| Url::parse(value).expect("Fixture URL should parse.");

		ProviderDescriptor::builder(
			ProviderId::new("acme").expect("Provider fixture should be valid."),
			"https://idp.example.com",
		)
		.authorization_endpoint(url("https://idp.example.com/authorize"))
		.token_endpoint(url("https://idp.example.com/token"))
		.jwks_uri(url("https://idp.example.com/jwks"))
		.id_token_algorithms(algorithms.iter().copied())
		.build()
		.expect("Descriptor should build.")
	}

	fn key_set(kid: &str) -> JwkSet {
		serde_json::from_value(serde_json::json!({
			"keys": [{
				"kty": "oct",
				"kid": kid,
				"alg": "HS256",
				"k": URL_SAFE_NO_PAD.encode(SECRET),
			}]
		}))
		.expect("Key set fixture should deserialize.")
	}

	fn id_token(kid: Option<&str>, claims: serde_json::Value) -> String {
		let mut header = Header::new(Algorithm::HS256);

		header.kid = kid.map(str::to_owned);

		jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(SECRET))
			.expect("ID token fixture should encode.")
	}

	fn standard_claims() -> serde_json::Value {
		serde_json::json!({
			"iss": "https://idp.example.com",
			"aud": "client-id",
			"exp": OffsetDateTime::now_utc().unix_timestamp() + 600,
			"sub": "sub-1",
			"email": "ada@example.com",
			"name": "Ada Lovelace",
		})
	}

	#[test]
	fn verifies_signature_audience_and_issuer() {
		let claims = verify_id_token(
			&id_token(Some("k1"), standard_claims()),
			&key_set("k1"),
			&descriptor(&[Algorithm::HS256]),
			"client-id",
		)
		.expect("ID token should verify.");

		assert_eq!(claims.subject, "sub-1");
		assert_eq!(claims.email, "ada@example.com");
		assert_eq!(claims.preferred_display_name(), "Ada Lovelace");
	}

	#[test]
	fn rejects_wrong_audience() {
		let err = verify_id_token(
			&id_token(Some("k1"), standard_claims()),
			&key_set("k1"),
			&descriptor(&[Algorithm::HS256]),
			"someone-else",
		)
		.expect_err("Foreign audience must be rejected.");

		assert!(matches!(err, ProviderError::IdToken(_)));
	}

	#[test]
	fn rejects_algorithms_the_provider_does_not_advertise() {
		let err = verify_id_token(
			&id_token(Some("k1"), standard_claims()),
			&key_set("k1"),
			&descriptor(&[Algorithm::RS256]),
			"client-id",
		)
		.expect_err("HS256 must be rejected for an RS256 provider.");

		assert!(matches!(err, ProviderError::UnsupportedAlgorithm { algorithm } if algorithm == "HS256"));
	}

	#[test]
	fn unknown_key_ids_are_reported() {
		let err = verify_id_token(
			&id_token(Some("rotated"), standard_claims()),
			&key_set("k1"),
			&descriptor(&[Algorithm::HS256]),
			"client-id",
		)
		.expect_err("Unknown kid must be rejected.");

		assert!(matches!(err, ProviderError::UnknownSigningKey { kid } if kid == "rotated"));
	}

	#[test]
	fn tokens_without_kid_use_the_only_key() {
		verify_id_token(
			&id_token(None, standard_claims()),
			&key_set("k1"),
			&descriptor(&[Algorithm::HS256]),
			"client-id",
		)
		.expect("Single-key sets should accept tokens without kid.");
	}

	#[test]
	fn email_is_required() {
		let mut claims = standard_claims();

		claims.as_object_mut().expect("Claims fixture should be an object.").remove("email");

		let err = verify_id_token(
			&id_token(Some("k1"), claims),
			&key_set("k1"),
			&descriptor(&[Algorithm::HS256]),
			"client-id",
		)
		.expect_err("Missing email must be rejected.");

		assert!(matches!(err, ProviderError::MissingClaim { claim: "email" }));
	}

	#[test]
	fn display_name_falls_back_to_email() {
		let claims = ProviderClaims {
			subject: "sub-1".into(),
			email: "ada@example.com".into(),
			name: Some(" ".into()),
			..Default::default()
		};

		assert_eq!(claims.preferred_display_name(), "ada@example.com");
	}
}
