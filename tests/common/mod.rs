#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::prelude::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use time::{OffsetDateTime, macros::datetime};
// self
use auth_broker::{
	auth::{ProviderId, UserId},
	broker::ReqwestBroker,
	clock::ManualClock,
	config::{BrokerConfig, ProviderConfig},
	directory::{MemoryDirectory, Role, User},
	http::ReqwestHttpClient,
	reqwest::Client as ReqwestClient,
	url::Url,
};

pub const CLIENT_ID: &str = "broker-it";
pub const CLIENT_SECRET: &str = "secret-it";
pub const SIGNING_SECRET: &str = "signing-secret-it";
pub const KEY_ID: &str = "k1";
pub const PROVIDER_KEY: &[u8] = b"provider-hmac-key-for-integration-tests";
pub const START: OffsetDateTime = datetime!(2025-01-01 12:00 UTC);

/// Builds a reqwest transport that accepts the self-signed certificate served by `httpmock`.
pub fn insecure_http_client() -> ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

pub fn provider_id(value: &str) -> ProviderId {
	ProviderId::new(value).expect("Provider identifier fixture should be valid.")
}

pub fn user_id(value: &str) -> UserId {
	UserId::new(value).expect("User identifier fixture should be valid.")
}

pub fn seeded_directory(users: &[&str]) -> MemoryDirectory {
	let directory = MemoryDirectory::default();

	for id in users {
		directory.seed(User {
			id: user_id(id),
			email: format!("{id}@example.com"),
			display_name: id.to_uppercase(),
			role: Role::User,
			created_at: START,
		});
	}

	directory
}

pub fn issuer(server: &MockServer) -> String {
	server.base_url()
}

pub fn provider_config(server: &MockServer, name: &str) -> ProviderConfig {
	ProviderConfig::new(
		name,
		CLIENT_ID,
		CLIENT_SECRET,
		Url::parse(&issuer(server)).expect("Mock issuer URL should parse."),
		Url::parse("https://app.example.com/auth/providers/callback")
			.expect("Redirect URL should parse."),
	)
}

pub fn broker_config(server: &MockServer) -> BrokerConfig {
	BrokerConfig::new(SIGNING_SECRET)
		.with_provider(provider_id("acme"), provider_config(server, "Acme"))
		.with_quick_connect_url(
			Url::parse("https://app.example.com/link").expect("Quick-connect URL should parse."),
		)
}

pub fn build_broker(
	config: &BrokerConfig,
	directory: &MemoryDirectory,
	clock: &ManualClock,
) -> Arc<ReqwestBroker> {
	let broker =
		ReqwestBroker::with_http_client(config, Arc::new(directory.clone()), insecure_http_client())
			.expect("Broker should build from the test configuration.")
			.with_clock(clock.clone());

	Arc::new(broker)
}

pub async fn mock_discovery(server: &MockServer) -> httpmock::Mock<'_> {
	let document = json!({
		"issuer": issuer(server),
		"authorization_endpoint": server.url("/authorize"),
		"token_endpoint": server.url("/token"),
		"jwks_uri": server.url("/jwks"),
		"id_token_signing_alg_values_supported": ["HS256"],
	});

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").json_body(document);
		})
		.await
}

pub async fn mock_jwks<'a>(server: &'a MockServer, kid: &str) -> httpmock::Mock<'a> {
	let keys = json!({
		"keys": [{
			"kty": "oct",
			"kid": kid,
			"alg": "HS256",
			"k": URL_SAFE_NO_PAD.encode(PROVIDER_KEY),
		}]
	});

	server
		.mock_async(|when, then| {
			when.method(GET).path("/jwks");
			then.status(200).header("content-type", "application/json").json_body(keys);
		})
		.await
}

pub async fn mock_token<'a>(
	server: &'a MockServer,
	code: &str,
	id_token: &str,
) -> httpmock::Mock<'a> {
	let body = json!({
		"access_token": "access-it",
		"token_type": "bearer",
		"expires_in": 3600,
		"id_token": id_token,
	});
	let code = format!("code={code}");

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes(code.as_str())
				.body_includes("code_verifier=");
			then.status(200).header("content-type", "application/json").json_body(body);
		})
		.await
}

pub fn id_token(server: &MockServer, kid: &str, claims: Value) -> String {
	let mut header = Header::new(Algorithm::HS256);
	let mut payload = json!({
		"iss": issuer(server),
		"aud": CLIENT_ID,
		"exp": OffsetDateTime::now_utc().unix_timestamp() + 600,
		"sub": "sub-ada",
		"email": "ada@example.com",
		"name": "Ada Lovelace",
	});

	if let (Some(target), Some(extra)) = (payload.as_object_mut(), claims.as_object()) {
		for (key, value) in extra {
			target.insert(key.clone(), value.clone());
		}
	}

	header.kid = Some(kid.to_owned());

	jsonwebtoken::encode(&header, &payload, &EncodingKey::from_secret(PROVIDER_KEY))
		.expect("ID token fixture should encode.")
}

/// Starts a mock OIDC issuer serving discovery and a single-key JWKS.
pub async fn start_issuer() -> MockServer {
	let server = MockServer::start_async().await;

	mock_discovery(&server).await;
	mock_jwks(&server, KEY_ID).await;

	server
}
