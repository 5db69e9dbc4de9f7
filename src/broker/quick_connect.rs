//! Quick-connect pairing flow: initiate, claim, poll, and redeem.

// self
use crate::{
	_prelude::*,
	auth::{Secret, UserId},
	broker::{Broker, record_outcome},
	http::ProviderHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	requests::RequestStatus,
};

const KIND: FlowKind = FlowKind::QuickConnect;

/// Values handed to the device that started pairing.
#[derive(Clone, Debug)]
pub struct QuickConnectInitiation {
	/// Code the user types on the signed-in device.
	pub code: String,
	/// Secret required to poll and redeem the request.
	pub challenge: Secret,
	/// Landing page for the signed-in device, when configured.
	pub auth_url: Option<Url>,
	/// Instant after which the request can no longer be claimed.
	pub expires: OffsetDateTime,
}

impl<C> Broker<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Starts a pairing request under a fresh code.
	pub fn create_quick_connect(&self) -> Result<QuickConnectInitiation> {
		let _span = FlowSpan::new(KIND, "create_request").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = self.quick_connect_requests.create(self.expiry.deadlines(self.now())).map(
			|ticket| QuickConnectInitiation {
				auth_url: self.quick_connect_url.as_ref().map(|base| {
					let mut url = base.clone();

					url.query_pairs_mut().append_pair("code", &ticket.code);

					url
				}),
				code: ticket.code,
				challenge: ticket.challenge,
				expires: ticket.deadlines.expires,
			},
		);

		record_outcome(KIND, &result);

		result
	}

	/// Claims `code` for the authenticated `user`; no challenge is required.
	pub fn claim_quick_connect(&self, code: &str, user: &UserId) -> Result<()> {
		let _span = FlowSpan::new(KIND, "claim").entered();
		let result = self.quick_connect_requests.claim(code, user.clone(), self.now());

		#[cfg(feature = "tracing")]
		{
			if result.is_ok() {
				tracing::info!(user = %user, "quick-connect code claimed");
			}
		}

		result
	}

	/// Reports the status of a pairing request after re-validating expiry.
	pub fn quick_connect_status(&self, code: &str, challenge: &str) -> Result<RequestStatus> {
		let _span = FlowSpan::new(KIND, "check_status").entered();

		self.quick_connect_requests.status(code, challenge, self.now())
	}

	/// Redeems a claimed pairing request for a signed token of the claiming user.
	///
	/// The request is forced to `expired` before signing, so it can be redeemed once.
	pub async fn finish_quick_connect(&self, code: &str, challenge: &str) -> Result<Secret> {
		let span = FlowSpan::new(KIND, "redeem");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let user = self.quick_connect_requests.redeem(code, challenge, self.now())?;

				self.signer.sign(&user, self.now()).await
			})
			.await;

		record_outcome(KIND, &result);

		result
	}
}
