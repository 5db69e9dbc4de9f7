// crates.io
use jsonwebtoken::Algorithm;
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Issuer is empty.
	#[error("Missing issuer.")]
	MissingIssuer,
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Key set location is required to verify ID tokens.
	#[error("Missing jwks_uri.")]
	MissingJwksUri,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Issuer as reported by the provider.
	pub issuer: String,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	pub token_endpoint: Option<Url>,
	/// JWKS location.
	pub jwks_uri: Option<Url>,
	/// Accepted ID-token algorithms; empty means the OIDC default (`RS256`).
	pub id_token_algorithms: Vec<Algorithm>,
	/// Preferred client authentication method for the token endpoint.
	pub preferred_client_auth_method: ClientAuthMethod,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier and issuer.
	pub fn new(id: ProviderId, issuer: impl Into<String>) -> Self {
		Self {
			id,
			issuer: issuer.into(),
			authorization_endpoint: None,
			token_endpoint: None,
			jwks_uri: None,
			id_token_algorithms: Vec::new(),
			preferred_client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the JWKS location.
	pub fn jwks_uri(mut self, url: Url) -> Self {
		self.jwks_uri = Some(url);

		self
	}

	/// Adds accepted ID-token algorithms.
	pub fn id_token_algorithms<I>(mut self, algorithms: I) -> Self
	where
		I: IntoIterator<Item = Algorithm>,
	{
		for algorithm in algorithms {
			if !self.id_token_algorithms.contains(&algorithm) {
				self.id_token_algorithms.push(algorithm);
			}
		}

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		if self.issuer.trim().is_empty() {
			return Err(ProviderDescriptorError::MissingIssuer);
		}

		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let jwks = self.jwks_uri.ok_or(ProviderDescriptorError::MissingJwksUri)?;
		let id_token_algorithms = if self.id_token_algorithms.is_empty() {
			vec![Algorithm::RS256]
		} else {
			self.id_token_algorithms
		};
		let descriptor = ProviderDescriptor {
			id: self.id,
			issuer: self.issuer,
			endpoints: ProviderEndpoints { authorization, token, jwks },
			id_token_algorithms,
			preferred_client_auth_method: self.preferred_client_auth_method,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.endpoints.authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("jwks", &self.endpoints.jwks)?;

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() != "https" {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
