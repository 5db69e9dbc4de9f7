//! OpenID Connect discovery and key-set retrieval.

// crates.io
use jsonwebtoken::{Algorithm, jwk::JwkSet};
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	error::{ConfigError, ProviderError},
	http::{ProviderHttpClient, fetch_json},
	provider::{ClientAuthMethod, ProviderDescriptor},
};

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// Subset of the OpenID provider metadata the broker relies on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryDocument {
	/// Issuer identifier reported by the provider.
	pub issuer: String,
	/// Authorization endpoint.
	pub authorization_endpoint: Url,
	/// Token endpoint.
	pub token_endpoint: Url,
	/// Key set location.
	pub jwks_uri: Url,
	/// Algorithms the provider may sign ID tokens with.
	#[serde(default)]
	pub id_token_signing_alg_values_supported: Vec<String>,
}
impl DiscoveryDocument {
	/// Validates the document against the configured issuer and converts it to a descriptor.
	///
	/// Algorithms unknown to the verifier (for example `none`) are dropped.
	pub fn into_descriptor(
		self,
		id: ProviderId,
		configured_issuer: &Url,
		client_auth: ClientAuthMethod,
	) -> Result<ProviderDescriptor, ProviderError> {
		let expected = configured_issuer.as_str().trim_end_matches('/');

		if self.issuer.trim_end_matches('/') != expected {
			return Err(ProviderError::IssuerMismatch {
				expected: expected.to_owned(),
				found: self.issuer,
			});
		}

		let algorithms = self
			.id_token_signing_alg_values_supported
			.iter()
			.filter_map(|value| Algorithm::from_str(value).ok())
			.collect::<Vec<_>>();

		Ok(ProviderDescriptor::builder(id, self.issuer)
			.authorization_endpoint(self.authorization_endpoint)
			.token_endpoint(self.token_endpoint)
			.jwks_uri(self.jwks_uri)
			.id_token_algorithms(algorithms)
			.preferred_client_auth_method(client_auth)
			.build()?)
	}
}

/// Returns `{issuer}/.well-known/openid-configuration`.
pub fn discovery_url(issuer: &Url) -> Result<Url, ConfigError> {
	let base = issuer.as_str().trim_end_matches('/');

	Url::parse(&format!("{base}/{WELL_KNOWN_PATH}"))
		.map_err(|source| ConfigError::InvalidUrl { field: "discovery", source })
}

/// Fetches and validates the provider's discovery document.
pub(crate) async fn discover<C>(
	http: &C,
	id: &ProviderId,
	issuer: &Url,
	client_auth: ClientAuthMethod,
) -> Result<ProviderDescriptor, ProviderError>
where
	C: ?Sized + ProviderHttpClient,
{
	let url = discovery_url(issuer)?;
	let document = fetch_json::<_, DiscoveryDocument>(http, &url).await?;

	document.into_descriptor(id.clone(), issuer, client_auth)
}

/// Fetches the provider's current key set.
pub(crate) async fn fetch_keys<C>(
	http: &C,
	descriptor: &ProviderDescriptor,
) -> Result<JwkSet, ProviderError>
where
	C: ?Sized + ProviderHttpClient,
{
	fetch_json(http, &descriptor.endpoints.jwks).await
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::provider::ProviderDescriptorError;

	fn issuer() -> Url {
		Url::parse("https://idp.example.com/").expect("Issuer fixture should parse.")
	}

	fn document(issuer: &str) -> DiscoveryDocument {
		serde_json::from_value(serde_json::json!({
			"issuer": issuer,
			"authorization_endpoint": "https://idp.example.com/authorize",
			"token_endpoint": "https://idp.example.com/token",
			"jwks_uri": "https://idp.example.com/jwks",
			"id_token_signing_alg_values_supported": ["RS256", "none", "ES256"],
		}))
		.expect("Discovery fixture should deserialize.")
	}

	fn acme() -> ProviderId {
		ProviderId::new("acme").expect("Provider fixture should be valid.")
	}

	#[test]
	fn discovery_url_ignores_trailing_slash() {
		assert_eq!(
			discovery_url(&issuer()).expect("Discovery URL should build.").as_str(),
			"https://idp.example.com/.well-known/openid-configuration"
		);
	}

	#[test]
	fn converts_document_and_drops_unknown_algorithms() {
		let descriptor = document("https://idp.example.com")
			.into_descriptor(acme(), &issuer(), ClientAuthMethod::ClientSecretPost)
			.expect("Matching issuer should convert.");

		assert_eq!(descriptor.issuer, "https://idp.example.com");
		assert_eq!(descriptor.id_token_algorithms, vec![Algorithm::RS256, Algorithm::ES256]);
		assert_eq!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost);
	}

	#[test]
	fn issuer_mismatch_is_rejected() {
		let err = document("https://evil.example.com")
			.into_descriptor(acme(), &issuer(), ClientAuthMethod::default())
			.expect_err("Foreign issuer must be rejected.");

		assert!(matches!(
			err,
			ProviderError::IssuerMismatch { found, .. } if found == "https://evil.example.com"
		));
	}

	#[test]
	fn insecure_endpoints_are_rejected() {
		let mut document = document("https://idp.example.com");

		document.jwks_uri = Url::parse("http://idp.example.com/jwks").expect("URL should parse.");

		let err = document
			.into_descriptor(acme(), &issuer(), ClientAuthMethod::default())
			.expect_err("Plain HTTP key set must be rejected.");

		assert!(matches!(
			err,
			ProviderError::Descriptor(ProviderDescriptorError::InsecureEndpoint { endpoint: "jwks", .. })
		));
	}
}
