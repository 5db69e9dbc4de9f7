#![cfg(feature = "axum")]

mod common;

// crates.io
use httpmock::MockServer;
use serde_json::{Value, json};
use tower::ServiceExt;
// self
use auth_broker::{
	api,
	axum::{
		Router,
		body::{self, Body},
		http::{Method, Request, StatusCode, header},
	},
	clock::ManualClock,
	config::BrokerConfig,
};
use common::*;

struct Reply {
	status: StatusCode,
	body: Vec<u8>,
}
impl Reply {
	fn json(&self) -> Value {
		serde_json::from_slice(&self.body).expect("Response body should be JSON.")
	}

	fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

async fn send(
	app: &Router,
	method: Method,
	uri: &str,
	bearer: Option<&str>,
	payload: Option<Value>,
) -> Reply {
	let mut request = Request::builder().method(method).uri(uri);

	if let Some(token) = bearer {
		request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
	}

	let body = match payload {
		Some(payload) => {
			request = request.header(header::CONTENT_TYPE, "application/json");

			Body::from(payload.to_string())
		},
		None => Body::empty(),
	};
	let response = app
		.clone()
		.oneshot(request.body(body).expect("Request should build."))
		.await
		.expect("Router is infallible.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Response body should be readable.")
		.to_vec();

	Reply { status, body }
}

#[tokio::test]
async fn providers_are_listed_in_natural_order() {
	let server = MockServer::start_async().await;
	let config = BrokerConfig::new(SIGNING_SECRET)
		.with_provider(provider_id("p10"), provider_config(&server, "Provider 10"))
		.with_provider(provider_id("p9"), provider_config(&server, "Provider 9"))
		.with_provider(provider_id("alpha"), provider_config(&server, "alpha"));
	let clock = ManualClock::new(START);
	let app = api::router(build_broker(&config, &seeded_directory(&[]), &clock));
	let reply = send(&app, Method::GET, "/auth/providers", None, None).await;

	assert_eq!(reply.status, StatusCode::OK);
	assert_eq!(
		reply.json(),
		json!([
			{ "id": "alpha", "displayName": "alpha" },
			{ "id": "p9", "displayName": "Provider 9" },
			{ "id": "p10", "displayName": "Provider 10" },
		])
	);
}

#[tokio::test]
async fn quick_connect_round_trip_over_http() {
	let server = MockServer::start_async().await;
	let directory = seeded_directory(&["u1"]);
	let clock = ManualClock::new(START);
	let broker = build_broker(&broker_config(&server), &directory, &clock);
	let app = api::router(broker.clone());
	let initiated = send(&app, Method::POST, "/auth/quick-connect/initiate", None, None).await;

	assert_eq!(initiated.status, StatusCode::OK);

	let initiated = initiated.json();
	let code = initiated["code"].as_str().expect("Code should be a string.").to_owned();
	let challenge = initiated["challenge"].as_str().expect("Challenge should be a string.").to_owned();

	assert_eq!(initiated["expiresAt"], "2025-01-01T12:05:00Z");
	assert_eq!(initiated["authUrl"], format!("https://app.example.com/link?code={code}"));

	let anonymous =
		send(&app, Method::POST, "/auth/quick-connect/claim", None, Some(json!({ "code": code })))
			.await;

	assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
	assert_eq!(anonymous.json()["code"], "unauthorized");

	let session = broker
		.signer()
		.sign(&user_id("u1"), START)
		.await
		.expect("Seeded user should be signed.");
	let claimed = send(
		&app,
		Method::POST,
		"/auth/quick-connect/claim",
		Some(session.expose()),
		Some(json!({ "code": code })),
	)
	.await;

	assert_eq!(claimed.status, StatusCode::OK);

	let request = json!({ "code": code, "challenge": challenge });
	let status =
		send(&app, Method::POST, "/auth/quick-connect/status", None, Some(request.clone())).await;

	assert_eq!(status.json(), json!({ "status": "completed" }));

	let finished =
		send(&app, Method::POST, "/auth/quick-connect/finish", None, Some(request.clone())).await;

	assert_eq!(finished.status, StatusCode::OK);

	let token = finished.json()["token"].as_str().expect("Token should be a string.").to_owned();
	let me = send(&app, Method::GET, "/auth/me", Some(&token), None).await;

	assert_eq!(me.status, StatusCode::OK);
	assert_eq!(
		me.json(),
		json!({ "id": "u1", "email": "u1@example.com", "displayName": "U1", "role": "user" })
	);

	let replay = send(&app, Method::POST, "/auth/quick-connect/finish", None, Some(request)).await;

	assert_eq!(replay.status, StatusCode::CONFLICT);
	assert_eq!(replay.json()["code"], "request_not_ready");

	let guessed = send(
		&app,
		Method::POST,
		"/auth/quick-connect/status",
		None,
		Some(json!({ "code": code, "challenge": "wrong" })),
	)
	.await;

	assert_eq!(guessed.status, StatusCode::NOT_FOUND);
	assert_eq!(guessed.json()["code"], "request_not_found");
}

#[tokio::test]
async fn bogus_bearer_tokens_are_rejected() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let app = api::router(build_broker(&broker_config(&server), &seeded_directory(&["u1"]), &clock));
	let reply = send(&app, Method::GET, "/auth/me", Some("not-a-token"), None).await;

	assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_providers_return_not_found() {
	let server = MockServer::start_async().await;
	let clock = ManualClock::new(START);
	let app = api::router(build_broker(&broker_config(&server), &seeded_directory(&[]), &clock));
	let reply = send(
		&app,
		Method::POST,
		"/auth/providers/initiate",
		None,
		Some(json!({ "providerId": "nope" })),
	)
	.await;

	assert_eq!(reply.status, StatusCode::NOT_FOUND);
	assert_eq!(reply.json()["code"], "provider_not_found");
}

#[tokio::test]
async fn callbacks_without_code_fail_the_request() {
	let server = start_issuer().await;
	let clock = ManualClock::new(START);
	let app = api::router(build_broker(&broker_config(&server), &seeded_directory(&[]), &clock));
	let initiated = send(
		&app,
		Method::POST,
		"/auth/providers/initiate",
		None,
		Some(json!({ "providerId": "acme" })),
	)
	.await
	.json();
	let request_id = initiated["requestId"].as_str().expect("Request id should be a string.");
	let challenge = initiated["challenge"].as_str().expect("Challenge should be a string.");
	let callback = send(
		&app,
		Method::GET,
		&format!("/auth/providers/callback?state={request_id}&error=access_denied"),
		None,
		None,
	)
	.await;

	assert_eq!(callback.status, StatusCode::BAD_REQUEST);
	assert!(callback.text().contains("Sign-in failed"));

	let status = send(
		&app,
		Method::POST,
		"/auth/providers/status",
		None,
		Some(json!({ "requestId": request_id, "challenge": challenge })),
	)
	.await;

	assert_eq!(status.json(), json!({ "status": "failed" }));

	let unknown =
		send(&app, Method::GET, "/auth/providers/callback?state=missing&code=abc", None, None).await;

	assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_login_round_trip_over_http() {
	let server = start_issuer().await;
	let directory = seeded_directory(&[]);
	let clock = ManualClock::new(START);
	let app = api::router(build_broker(&broker_config(&server), &directory, &clock));

	mock_token(&server, "code123", &id_token(&server, KEY_ID, json!({}))).await;

	let initiated = send(
		&app,
		Method::POST,
		"/auth/providers/initiate",
		None,
		Some(json!({ "providerId": "acme" })),
	)
	.await;

	assert_eq!(initiated.status, StatusCode::OK);

	let initiated = initiated.json();
	let request_id = initiated["requestId"].as_str().expect("Request id should be a string.");
	let request = json!({ "requestId": request_id, "challenge": initiated["challenge"] });
	let pending =
		send(&app, Method::POST, "/auth/providers/status", None, Some(request.clone())).await;

	assert_eq!(pending.json(), json!({ "status": "pending" }));

	let early = send(&app, Method::POST, "/auth/providers/finish", None, Some(request.clone())).await;

	assert_eq!(early.status, StatusCode::CONFLICT);

	let callback = send(
		&app,
		Method::GET,
		&format!("/auth/providers/callback?state={request_id}&code=code123"),
		None,
		None,
	)
	.await;

	assert_eq!(callback.status, StatusCode::OK);
	assert!(callback.text().contains("Signed in"));

	let finished = send(&app, Method::POST, "/auth/providers/finish", None, Some(request)).await;

	assert_eq!(finished.status, StatusCode::OK);

	let token = finished.json()["token"].as_str().expect("Token should be a string.").to_owned();
	let me = send(&app, Method::GET, "/auth/me", Some(&token), None).await.json();

	assert_eq!(me["email"], "ada@example.com");
	assert_eq!(me["displayName"], "Ada Lovelace");
	assert_eq!(me["role"], "user");
}

#[tokio::test]
async fn expired_callbacks_render_the_expired_page() {
	let server = start_issuer().await;
	let clock = ManualClock::new(START);
	let app = api::router(build_broker(&broker_config(&server), &seeded_directory(&[]), &clock));
	let initiated = send(
		&app,
		Method::POST,
		"/auth/providers/initiate",
		None,
		Some(json!({ "providerId": "acme" })),
	)
	.await
	.json();
	let request_id = initiated["requestId"].as_str().expect("Request id should be a string.");

	clock.advance(time::Duration::minutes(6));

	let callback = send(
		&app,
		Method::GET,
		&format!("/auth/providers/callback?state={request_id}&code=code123"),
		None,
		None,
	)
	.await;

	assert_eq!(callback.status, StatusCode::GONE);
	assert!(callback.text().contains("Link expired"));
}
