//! Broker-level error types shared across request stores, providers, and collaborators.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, ProviderId, ScopeValidationError},
	directory::DirectoryError,
	provider::ProviderDescriptorError,
	token::SigningError,
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
///
/// The request-level variants are deliberately coarse: a challenge mismatch surfaces as
/// [`Error::RequestNotFound`] so callers cannot learn which codes exist.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Provider id is not part of the configured registry.
	#[error("Provider `{provider}` is not configured.")]
	ProviderNotFound {
		/// Identifier supplied by the caller.
		provider: String,
	},
	/// Generated identifier collided with a live request.
	#[error("Request already exists.")]
	RequestAlreadyExists,
	/// Request is unknown, already purged, or the challenge did not match.
	#[error("Request was not found.")]
	RequestNotFound,
	/// Request deadline has passed.
	#[error("Request has expired.")]
	RequestExpired,
	/// Request has not reached a redeemable state.
	#[error("Request is not ready to be redeemed.")]
	RequestNotReady,
	/// Request reached an inconsistent or unusable state.
	#[error("Request is invalid.")]
	RequestInvalid,
	/// Caller did not present a valid bearer token.
	#[error("Caller is not authenticated.")]
	Unauthorized,

	/// Provider discovery, exchange, or verification failed.
	#[error("Provider `{provider}` failed during {stage}.")]
	Provider {
		/// Provider that failed.
		provider: ProviderId,
		/// Operation that was in progress.
		stage: ProviderStage,
		/// Underlying provider failure.
		#[source]
		source: ProviderError,
	},
	/// Data-access collaborator failure.
	#[error(transparent)]
	Directory(#[from] DirectoryError),
	/// Token signing or verification failure.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Wraps a provider failure with the provider and stage that produced it.
	pub fn provider(provider: &ProviderId, stage: ProviderStage, source: ProviderError) -> Self {
		Self::Provider { provider: provider.clone(), stage, source }
	}

	/// Returns a stable snake_case label for logs and HTTP error bodies.
	pub const fn code(&self) -> &'static str {
		match self {
			Error::ProviderNotFound { .. } => "provider_not_found",
			Error::RequestAlreadyExists => "request_already_exists",
			Error::RequestNotFound => "request_not_found",
			Error::RequestExpired => "request_expired",
			Error::RequestNotReady => "request_not_ready",
			Error::RequestInvalid => "request_invalid",
			Error::Unauthorized => "unauthorized",
			Error::Provider { .. } => "provider_error",
			Error::Directory(_) => "directory_error",
			Error::Signing(SigningError::InvalidToken(_)) => "unauthorized",
			Error::Signing(_) => "signing_error",
			Error::Config(_) => "config_error",
		}
	}
}

/// Provider operation that produced a [`ProviderError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderStage {
	/// Discovery and client construction.
	Initialize,
	/// Authorization-code exchange and ID-token verification.
	Claim,
}
impl ProviderStage {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderStage::Initialize => "initialize",
			ProviderStage::Claim => "claim",
		}
	}
}
impl Display for ProviderStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failures raised while talking to an OIDC provider.
#[derive(Debug, ThisError)]
pub enum ProviderError {
	/// Request could not be constructed locally.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Discovered metadata failed validation.
	#[error(transparent)]
	Descriptor(#[from] ProviderDescriptorError),
	/// Discovery document advertises a different issuer.
	#[error("Discovery document issuer `{found}` does not match `{expected}`.")]
	IssuerMismatch {
		/// Configured issuer.
		expected: String,
		/// Issuer reported by the provider.
		found: String,
	},
	/// Token endpoint response omitted `id_token`.
	#[error("Token endpoint response is missing id_token.")]
	MissingIdToken,
	/// ID token failed signature or claim validation.
	#[error("ID token verification failed.")]
	IdToken(#[source] jsonwebtoken::errors::Error),
	/// ID token names a key absent from the provider key set.
	#[error("No provider signing key matches key id `{kid}`.")]
	UnknownSigningKey {
		/// Key identifier from the token header.
		kid: String,
	},
	/// ID token is signed with an algorithm the provider does not advertise.
	#[error("ID token algorithm `{algorithm}` is not accepted.")]
	UnsupportedAlgorithm {
		/// Algorithm label from the token header.
		algorithm: String,
	},
	/// Verified ID token lacks a required claim.
	#[error("ID token is missing the `{claim}` claim.")]
	MissingClaim {
		/// Claim name.
		claim: &'static str,
	},
	/// Provider rejected the authorization code.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A URL could not be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Which URL failed.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// TOML document could not be parsed.
	#[error("Configuration could not be parsed.")]
	Parse(#[from] toml::de::Error),
	/// Signing secret is empty.
	#[error("Signing secret cannot be empty.")]
	EmptySigningSecret,
	/// Provider entry lacks a required field.
	#[error("Provider `{provider}` is missing `{field}`.")]
	MissingField {
		/// Provider identifier.
		provider: String,
		/// Missing field name.
		field: &'static str,
	},
	/// Provider scopes do not request an ID token.
	#[error("Provider `{provider}` must request the openid scope.")]
	MissingOpenIdScope {
		/// Provider identifier.
		provider: String,
	},
	/// A duration setting is zero.
	#[error("The {field} setting must be positive.")]
	ZeroDuration {
		/// Setting name.
		field: &'static str,
	},
	/// Scopes cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] ScopeValidationError),
	/// Identifier failed validation.
	#[error("Configured identifier is invalid.")]
	Identifier(#[from] IdentifierError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry by re-initiating the flow).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Provider endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Provider responded with JSON that could not be parsed.
	#[error("Provider endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
