//! Axum HTTP surface for both login flows.
//!
//! | Method | Path | Body | Response |
//! | --- | --- | --- | --- |
//! | `GET` | `/auth/providers` | | `[{id, displayName}]` |
//! | `POST` | `/auth/providers/initiate` | `{providerId}` | `{requestId, authUrl, challenge, expiresAt}` |
//! | `GET` | `/auth/providers/callback?state=&code=` | | HTML page |
//! | `POST` | `/auth/providers/status` | `{requestId, challenge}` | `{status}` |
//! | `POST` | `/auth/providers/finish` | `{requestId, challenge}` | `{token}` |
//! | `POST` | `/auth/quick-connect/initiate` | | `{code, challenge, authUrl, expiresAt}` |
//! | `POST` | `/auth/quick-connect/claim` | `{code}` (bearer) | empty |
//! | `POST` | `/auth/quick-connect/status` | `{code, challenge}` | `{status}` |
//! | `POST` | `/auth/quick-connect/finish` | `{code, challenge}` | `{token}` |
//! | `GET` | `/auth/me` | (bearer) | `{id, email, displayName, role}` |
//!
//! Errors are returned as `{code, message}` with the status from [`status_code`].

mod render;

pub use render::CallbackPage;

// crates.io
use axum::{
	Json, Router,
	extract::{FromRequestParts, Query, State},
	http::{StatusCode, header::AUTHORIZATION, request::Parts},
	response::{IntoResponse, Response},
	routing::{get, post},
};
// self
use crate::{
	_prelude::*,
	auth::UserId,
	broker::ReqwestBroker,
	directory::{Role, User},
	provider::ProviderSummary,
	requests::RequestStatus,
	token::SigningError,
};

/// Shared state of every handler.
pub type ApiState = Arc<ReqwestBroker>;

/// Builds the router serving every broker endpoint.
pub fn router(broker: ApiState) -> Router {
	Router::new()
		.route("/auth/providers", get(list_providers))
		.route("/auth/providers/initiate", post(initiate_provider))
		.route("/auth/providers/callback", get(provider_callback))
		.route("/auth/providers/status", post(provider_status))
		.route("/auth/providers/finish", post(finish_provider))
		.route("/auth/quick-connect/initiate", post(initiate_quick_connect))
		.route("/auth/quick-connect/claim", post(claim_quick_connect))
		.route("/auth/quick-connect/status", post(quick_connect_status))
		.route("/auth/quick-connect/finish", post(finish_quick_connect))
		.route("/auth/me", get(me))
		.with_state(broker)
}

/// Maps a broker error onto an HTTP status.
pub fn status_code(err: &Error) -> StatusCode {
	match err {
		Error::ProviderNotFound { .. } | Error::RequestNotFound => StatusCode::NOT_FOUND,
		Error::RequestExpired => StatusCode::GONE,
		Error::RequestNotReady | Error::RequestAlreadyExists => StatusCode::CONFLICT,
		Error::RequestInvalid => StatusCode::BAD_REQUEST,
		Error::Provider { .. } => StatusCode::BAD_GATEWAY,
		Error::Unauthorized | Error::Signing(SigningError::InvalidToken(_)) =>
			StatusCode::UNAUTHORIZED,
		Error::Directory(_) | Error::Signing(_) | Error::Config(_) =>
			StatusCode::INTERNAL_SERVER_ERROR,
	}
}

/// Broker error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub Error);
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		Self(e)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = status_code(&self.0);
		let message = if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
			#[cfg(feature = "tracing")]
			tracing::error!(code = self.0.code(), error = %self.0, "request failed");

			"Internal error.".to_owned()
		} else {
			self.0.to_string()
		};

		(status, Json(ErrorBody { code: self.0.code(), message })).into_response()
	}
}

/// Caller authenticated with `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);
impl FromRequestParts<ApiState> for AuthUser {
	type Rejection = ApiError;

	async fn from_request_parts(
		parts: &mut Parts,
		state: &ApiState,
	) -> Result<Self, Self::Rejection> {
		let token = parts
			.headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.strip_prefix("Bearer "))
			.map(str::trim)
			.filter(|token| !token.is_empty())
			.ok_or(ApiError(Error::Unauthorized))?;
		let user = state.authenticate(token).await?;

		Ok(Self(user))
	}
}

#[derive(Serialize)]
struct ErrorBody {
	code: &'static str,
	message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateProviderBody {
	provider_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderRequestBody {
	request_id: String,
	challenge: String,
}

#[derive(Deserialize)]
struct QuickConnectCodeBody {
	code: String,
}

#[derive(Deserialize)]
struct QuickConnectRequestBody {
	code: String,
	challenge: String,
}

#[derive(Deserialize)]
struct CallbackParams {
	state: Option<String>,
	code: Option<String>,
	error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderInitiationResponse {
	request_id: String,
	auth_url: Url,
	challenge: String,
	#[serde(with = "time::serde::rfc3339")]
	expires_at: OffsetDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuickConnectInitiationResponse {
	code: String,
	challenge: String,
	auth_url: Option<Url>,
	#[serde(with = "time::serde::rfc3339")]
	expires_at: OffsetDateTime,
}

#[derive(Serialize)]
struct StatusResponse {
	status: RequestStatus,
}

#[derive(Serialize)]
struct TokenResponse {
	token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
	id: UserId,
	email: String,
	display_name: String,
	role: Role,
}

async fn list_providers(State(broker): State<ApiState>) -> Json<Vec<ProviderSummary>> {
	Json(broker.list_providers())
}

async fn initiate_provider(
	State(broker): State<ApiState>,
	Json(body): Json<InitiateProviderBody>,
) -> Result<Json<ProviderInitiationResponse>, ApiError> {
	let initiation = broker.create_provider_request(&body.provider_id).await?;

	Ok(Json(ProviderInitiationResponse {
		request_id: initiation.request_id.into(),
		auth_url: initiation.auth_url,
		challenge: initiation.challenge.expose().to_owned(),
		expires_at: initiation.expires,
	}))
}

async fn provider_callback(
	State(broker): State<ApiState>,
	Query(params): Query<CallbackParams>,
) -> CallbackPage {
	let Some(state) = params.state.filter(|state| !state.is_empty()) else {
		return CallbackPage::Failed;
	};
	let code = params.code.filter(|code| !code.is_empty());
	let result = match (params.error, code) {
		(None, Some(code)) => broker.complete_provider_request(&state, &code),
		(_error, _) => {
			#[cfg(feature = "tracing")]
			tracing::info!(provider_error = ?_error, "provider callback carried no code");

			broker.fail_provider_request(&state).and(Err(Error::RequestInvalid))
		},
	};

	match result {
		Ok(()) => CallbackPage::Completed,
		Err(Error::RequestExpired) => CallbackPage::Expired,
		Err(_) => CallbackPage::Failed,
	}
}

async fn provider_status(
	State(broker): State<ApiState>,
	Json(body): Json<ProviderRequestBody>,
) -> Result<Json<StatusResponse>, ApiError> {
	let status = broker.provider_request_status(&body.request_id, &body.challenge)?;

	Ok(Json(StatusResponse { status }))
}

async fn finish_provider(
	State(broker): State<ApiState>,
	Json(body): Json<ProviderRequestBody>,
) -> Result<Json<TokenResponse>, ApiError> {
	let token = broker.finish_provider_request(&body.request_id, &body.challenge).await?;

	Ok(Json(TokenResponse { token: token.expose().to_owned() }))
}

async fn initiate_quick_connect(
	State(broker): State<ApiState>,
) -> Result<Json<QuickConnectInitiationResponse>, ApiError> {
	let initiation = broker.create_quick_connect()?;

	Ok(Json(QuickConnectInitiationResponse {
		code: initiation.code,
		challenge: initiation.challenge.expose().to_owned(),
		auth_url: initiation.auth_url,
		expires_at: initiation.expires,
	}))
}

async fn claim_quick_connect(
	State(broker): State<ApiState>,
	AuthUser(user): AuthUser,
	Json(body): Json<QuickConnectCodeBody>,
) -> Result<StatusCode, ApiError> {
	broker.claim_quick_connect(&body.code, &user.id)?;

	Ok(StatusCode::OK)
}

async fn quick_connect_status(
	State(broker): State<ApiState>,
	Json(body): Json<QuickConnectRequestBody>,
) -> Result<Json<StatusResponse>, ApiError> {
	let status = broker.quick_connect_status(&body.code, &body.challenge)?;

	Ok(Json(StatusResponse { status }))
}

async fn finish_quick_connect(
	State(broker): State<ApiState>,
	Json(body): Json<QuickConnectRequestBody>,
) -> Result<Json<TokenResponse>, ApiError> {
	let token = broker.finish_quick_connect(&body.code, &body.challenge).await?;

	Ok(Json(TokenResponse { token: token.expose().to_owned() }))
}

async fn me(AuthUser(user): AuthUser) -> Json<MeResponse> {
	Json(MeResponse {
		id: user.id,
		email: user.email,
		display_name: user.display_name,
		role: user.role,
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_errors_map_to_distinct_statuses() {
		assert_eq!(status_code(&Error::RequestNotFound), StatusCode::NOT_FOUND);
		assert_eq!(
			status_code(&Error::ProviderNotFound { provider: "acme".into() }),
			StatusCode::NOT_FOUND
		);
		assert_eq!(status_code(&Error::RequestExpired), StatusCode::GONE);
		assert_eq!(status_code(&Error::RequestNotReady), StatusCode::CONFLICT);
		assert_eq!(status_code(&Error::RequestInvalid), StatusCode::BAD_REQUEST);
		assert_eq!(status_code(&Error::Unauthorized), StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn internal_errors_hide_details() {
		let err = Error::Directory(crate::directory::DirectoryError::Backend {
			message: "connection string with password".into(),
		});
		let response = ApiError(err).into_response();

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Error body should be readable.");
		let body: serde_json::Value =
			serde_json::from_slice(&body).expect("Error body should be JSON.");

		assert_eq!(body["code"], "directory_error");
		assert_eq!(body["message"], "Internal error.");
		assert!(!body.to_string().contains("password"));
	}

	#[tokio::test]
	async fn client_errors_keep_their_message() {
		let response = ApiError(Error::RequestNotReady).into_response();
		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Error body should be readable.");
		let body: serde_json::Value =
			serde_json::from_slice(&body).expect("Error body should be JSON.");

		assert_eq!(body["code"], "request_not_ready");
		assert_eq!(body["message"], Error::RequestNotReady.to_string());
	}
}
