//! Provider descriptor data structures.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// crates.io
use jsonwebtoken::Algorithm;
// self
use crate::{_prelude::*, auth::ProviderId};

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the user is redirected to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
	/// JSON Web Key Set used to verify ID tokens.
	pub jwks: Url,
}

/// Immutable provider descriptor produced by discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Issuer exactly as the provider reports it; matched against the `iss` claim.
	pub issuer: String,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Signing algorithms accepted for ID tokens.
	pub id_token_algorithms: Vec<Algorithm>,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier and issuer.
	pub fn builder(id: ProviderId, issuer: impl Into<String>) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id, issuer)
	}

	/// Checks whether ID tokens signed with `algorithm` are accepted.
	pub fn accepts(&self, algorithm: Algorithm) -> bool {
		self.id_token_algorithms.contains(&algorithm)
	}
}
