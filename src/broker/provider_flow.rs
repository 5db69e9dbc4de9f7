//! Provider login flow: initiate, callback, poll, and redeem.

// self
use crate::{
	_prelude::*,
	auth::{PkcePair, RequestId, Secret, generate_challenge},
	broker::{Broker, record_outcome},
	http::ProviderHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderSummary,
	requests::{PendingProviderRequest, RedemptionOutcome, RequestStatus},
};

const KIND: FlowKind = FlowKind::ProviderLogin;

/// Values handed to the client that started a provider login.
#[derive(Clone, Debug)]
pub struct ProviderInitiation {
	/// Request id, also the OAuth2 `state`.
	pub request_id: RequestId,
	/// Provider authorization URL the user is sent to.
	pub auth_url: Url,
	/// Secret required to poll and redeem the request.
	pub challenge: Secret,
	/// Instant after which the request can no longer be completed.
	pub expires: OffsetDateTime,
}

impl<C> Broker<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Lists configured providers, naturally sorted by display name.
	pub fn list_providers(&self) -> Vec<ProviderSummary> {
		self.registry.list()
	}

	/// Starts a provider login.
	///
	/// The provider is initialized on first use, so discovery failures surface here.
	pub async fn create_provider_request(&self, provider: &str) -> Result<ProviderInitiation> {
		let span = FlowSpan::new(KIND, "create_request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let provider = self.registry.provider_id(provider)?.clone();
				let request_id = RequestId::generate();

				span.record_provider(&provider);
				span.record_request(&request_id);

				let pkce = PkcePair::generate();
				let auth_url = self.registry.authorize_url(&provider, &request_id, &pkce).await?;
				let challenge = generate_challenge();
				let deadlines = self.expiry.deadlines(self.now());

				self.provider_requests.insert(PendingProviderRequest {
					id: request_id.clone(),
					provider,
					challenge: challenge.clone(),
					pkce_verifier: pkce.verifier().clone(),
					deadlines,
				})?;

				Ok(ProviderInitiation { request_id, auth_url, challenge, expires: deadlines.expires })
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	/// Records the authorization code delivered to the callback.
	///
	/// The first callback wins; replays against a completed request are ignored.
	pub fn complete_provider_request(&self, request_id: &str, code: &str) -> Result<()> {
		let _span = FlowSpan::new(KIND, "complete_request").entered();
		let result = self.provider_requests.complete(request_id, code, self.now());

		record_outcome(KIND, &result);

		result
	}

	/// Fails a pending request after the provider reported an error on the callback.
	pub fn fail_provider_request(&self, request_id: &str) -> Result<()> {
		let _span = FlowSpan::new(KIND, "fail_request").entered();

		self.provider_requests.fail(request_id, self.now())
	}

	/// Returns the stored code once the request is completed, `None` while it is pending.
	pub fn peek_provider_code(&self, request_id: &str) -> Result<Option<Secret>> {
		self.provider_requests.peek_code(request_id, self.now())
	}

	/// Reports the status of a provider request after re-validating expiry.
	pub fn provider_request_status(&self, request_id: &str, challenge: &str) -> Result<RequestStatus> {
		let _span = FlowSpan::new(KIND, "check_status").entered();

		self.provider_requests.status(request_id, challenge, self.now())
	}

	/// Redeems a completed request for a signed user token.
	///
	/// The request is claimed under the store lock while the code is exchanged, the user
	/// resolved, and the token signed outside it. It settles as `expired` once a token exists and
	/// as `failed` when any step errors or the call is dropped mid-flight. At most one call per
	/// request can succeed.
	pub async fn finish_provider_request(&self, request_id: &str, challenge: &str) -> Result<Secret> {
		let span = FlowSpan::new(KIND, "redeem");

		span.record_request(request_id);
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let redemption =
					self.provider_requests.begin_redemption(request_id, challenge, self.now())?;

				span.record_provider(&redemption.provider);

				let signed = async {
					let claims = self
						.registry
						.claim(&redemption.provider, &redemption.code, &redemption.pkce_verifier)
						.await?;
					let user = self.resolver.resolve(&redemption.provider, &claims).await?;
					let token = self.signer.sign(&user, self.now()).await?;

					#[cfg(feature = "tracing")]
					tracing::info!(user = %user, "provider login redeemed");

					Ok::<_, Error>(token)
				}
				.await;

				redemption.finish(match &signed {
					Ok(_) => RedemptionOutcome::Redeemed,
					Err(_) => RedemptionOutcome::Failed,
				});

				signed
			})
			.await;

		record_outcome(KIND, &result);

		result
	}
}
