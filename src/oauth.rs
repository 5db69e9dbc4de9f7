//! Authorization-code exchange through the `oauth2` crate, keeping the OIDC `id_token`.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl,
	RequestTokenError, StandardRevocableToken, StandardTokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicErrorResponseType, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{PkcePair, RequestId, ScopeSet, Secret},
	config::ProviderConfig,
	error::{ConfigError, ProviderError, TransientError},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot, map_transport_error},
	provider::{ClientAuthMethod, ProviderDescriptor},
};

/// Extra token-response fields carrying the OIDC identity token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Raw compact JWS, when the provider returned one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Token endpoint response including [`IdTokenFields`].
pub type IdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type OidcClient = Client<
	BasicErrorResponse,
	IdTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type ExchangeError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;

/// Configured OAuth2 client for one provider.
pub(crate) struct CodeExchange<C>
where
	C: ?Sized + ProviderHttpClient,
{
	oauth_client: OidcClient,
	authorization: Url,
	client_id: String,
	redirect_url: Url,
	scopes: ScopeSet,
	http_client: Arc<C>,
}
impl<C> CodeExchange<C>
where
	C: ?Sized + ProviderHttpClient,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		config: &ProviderConfig,
		scopes: ScopeSet,
		http_client: Arc<C>,
	) -> Result<Self, ConfigError> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidUrl { field: "authorization", source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidUrl { field: "token", source })?;
		let redirect_url = RedirectUrl::new(config.redirect_url.to_string())
			.map_err(|source| ConfigError::InvalidUrl { field: "redirect", source })?;
		let mut oauth_client: OidcClient = Client::new(ClientId::new(config.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_redirect_uri(redirect_url);

		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			authorization: descriptor.endpoints.authorization.clone(),
			client_id: config.client_id.clone(),
			redirect_url: config.redirect_url.clone(),
			scopes,
			http_client,
		})
	}

	/// Builds the URL the user is sent to, carrying `state` and the PKCE challenge.
	pub(crate) fn authorize_url(&self, state: &RequestId, pkce: &PkcePair) -> Url {
		let mut url = self.authorization.clone();

		url.query_pairs_mut()
			.append_pair("response_type", "code")
			.append_pair("client_id", &self.client_id)
			.append_pair("redirect_uri", self.redirect_url.as_str())
			.append_pair("scope", &self.scopes.normalized())
			.append_pair("state", state)
			.append_pair("code_challenge", pkce.challenge())
			.append_pair("code_challenge_method", pkce.method().as_str());

		url
	}

	/// Exchanges `code` and returns the raw `id_token` from the token response.
	pub(crate) async fn exchange(
		&self,
		code: &Secret,
		pkce_verifier: &Secret,
	) -> Result<String, ProviderError> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.expose().to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.expose().to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err))?;

		response.extra_fields().id_token.clone().ok_or(ProviderError::MissingIdToken)
	}
}

fn map_request_error<E>(meta: Option<ResponseMetadata>, err: ExchangeError<E>) -> ProviderError
where
	E: 'static + Send + Sync + StdError,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(response, meta_ref),
		RequestTokenError::Request(error) => map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::ResponseParse { source: error, status: meta_status(meta_ref) }.into(),
		RequestTokenError::Other(message) => TransientError::Endpoint {
			message: format!("token endpoint: {message}"),
			status: meta_status(meta_ref),
			retry_after: meta_ref.and_then(|value| value.retry_after),
		}
		.into(),
	}
}

fn map_server_response_error(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> ProviderError {
	let reason = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	match response.error() {
		BasicErrorResponseType::InvalidClient | BasicErrorResponseType::UnauthorizedClient =>
			ProviderError::InvalidClient { reason },
		BasicErrorResponseType::InvalidGrant | BasicErrorResponseType::InvalidRequest =>
			ProviderError::InvalidGrant { reason },
		_ => TransientError::Endpoint {
			message: reason,
			status: meta_status(meta),
			retry_after: meta.and_then(|value| value.retry_after),
		}
		.into(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}
