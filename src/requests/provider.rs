//! Store for provider-flow requests keyed by request id.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, RequestId, Secret},
	requests::{Deadlines, Lifecycle, RequestStatus},
};

/// Freshly created provider request ready to be inserted.
#[derive(Debug)]
pub struct PendingProviderRequest {
	/// Request id, also sent as the OAuth2 `state`.
	pub id: RequestId,
	/// Provider the user is sent to.
	pub provider: ProviderId,
	/// Secret returned only to the request's creator.
	pub challenge: Secret,
	/// PKCE verifier replayed during the code exchange.
	pub pkce_verifier: Secret,
	/// Expiry and purge instants.
	pub deadlines: Deadlines,
}

/// Claim on a completed request, held while its code is exchanged outside the store lock.
///
/// The claim settles the request when it is dropped: as `failed` unless
/// [`finish`](Self::finish) recorded another outcome. A cancelled exchange therefore cannot
/// leave the request claimed.
pub struct ProviderRedemption<'a> {
	store: &'a ProviderRequestStore,
	outcome: RedemptionOutcome,
	/// Request being redeemed.
	pub id: RequestId,
	/// Provider that issued the code.
	pub provider: ProviderId,
	/// Authorization code delivered by the callback.
	pub code: Secret,
	/// PKCE verifier bound to the authorize URL.
	pub pkce_verifier: Secret,
}
impl ProviderRedemption<'_> {
	/// Commits the outcome of the exchange.
	pub fn finish(mut self, outcome: RedemptionOutcome) {
		self.outcome = outcome;
	}
}
impl Debug for ProviderRedemption<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderRedemption")
			.field("id", &self.id)
			.field("provider", &self.provider)
			.finish_non_exhaustive()
	}
}
impl Drop for ProviderRedemption<'_> {
	fn drop(&mut self) {
		self.store.settle_redemption(&self.id, self.outcome);
	}
}

/// Result of the out-of-lock exchange, committed with [`ProviderRedemption::finish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedemptionOutcome {
	/// Claims were resolved; the request is consumed.
	Redeemed,
	/// Exchange or resolution failed; the request cannot be retried.
	Failed,
}

#[derive(Debug)]
struct ProviderEntry {
	provider: ProviderId,
	challenge: Secret,
	pkce_verifier: Secret,
	code: Option<Secret>,
	redeeming: bool,
	lifecycle: Lifecycle,
}
impl ProviderEntry {
	fn expire_if_due(&mut self, now: OffsetDateTime) -> bool {
		let expired = self.lifecycle.expire_if_due(now);

		if expired {
			self.code = None;
		}

		expired
	}

	fn settle(&mut self, status: RequestStatus) {
		self.lifecycle.status = status;
		self.code = None;
		self.redeeming = false;
	}
}

/// Concurrency-safe map of provider-flow requests.
#[derive(Debug, Default)]
pub struct ProviderRequestStore(Mutex<HashMap<RequestId, ProviderEntry>>);
impl ProviderRequestStore {
	/// Stores a new `pending` request.
	pub fn insert(&self, request: PendingProviderRequest) -> Result<()> {
		let mut map = self.0.lock();

		if map.contains_key(&request.id) {
			return Err(Error::RequestAlreadyExists);
		}

		map.insert(
			request.id,
			ProviderEntry {
				provider: request.provider,
				challenge: request.challenge,
				pkce_verifier: request.pkce_verifier,
				code: None,
				redeeming: false,
				lifecycle: Lifecycle::pending(request.deadlines),
			},
		);

		Ok(())
	}

	/// Records the authorization code delivered by the provider callback.
	///
	/// The first callback wins: replays against a `completed` request are ignored. An empty
	/// code fails the request.
	pub fn complete(&self, id: &str, code: &str, now: OffsetDateTime) -> Result<()> {
		let mut map = self.0.lock();
		let entry = map.get_mut(id).ok_or(Error::RequestNotFound)?;

		if entry.expire_if_due(now) {
			return Err(Error::RequestExpired);
		}

		match entry.lifecycle.status {
			RequestStatus::Pending if code.is_empty() => {
				entry.settle(RequestStatus::Failed);

				Err(Error::RequestInvalid)
			},
			RequestStatus::Pending => {
				entry.lifecycle.status = RequestStatus::Completed;
				entry.code = Some(Secret::new(code));

				Ok(())
			},
			RequestStatus::Completed => Ok(()),
			RequestStatus::Expired => Err(Error::RequestExpired),
			RequestStatus::Failed => Err(Error::RequestInvalid),
		}
	}

	/// Fails a `pending` request after the provider reported an error on the callback.
	pub fn fail(&self, id: &str, now: OffsetDateTime) -> Result<()> {
		let mut map = self.0.lock();
		let entry = map.get_mut(id).ok_or(Error::RequestNotFound)?;

		if entry.expire_if_due(now) {
			return Err(Error::RequestExpired);
		}
		if entry.lifecycle.status == RequestStatus::Pending {
			entry.settle(RequestStatus::Failed);
		}

		Ok(())
	}

	/// Returns the stored code once the request is `completed`, `None` while it is not.
	pub fn peek_code(&self, id: &str, now: OffsetDateTime) -> Result<Option<Secret>> {
		let mut map = self.0.lock();
		let entry = map.get_mut(id).ok_or(Error::RequestNotFound)?;

		entry.expire_if_due(now);

		match entry.lifecycle.status {
			RequestStatus::Completed => Ok(entry.code.clone()),
			_ => Ok(None),
		}
	}

	/// Reports the status after re-validating expiry.
	pub fn status(&self, id: &str, challenge: &str, now: OffsetDateTime) -> Result<RequestStatus> {
		let mut map = self.0.lock();
		let entry = lookup(&mut map, id, challenge)?;

		entry.expire_if_due(now);

		Ok(entry.lifecycle.status)
	}

	/// Claims a `completed` request for redemption.
	///
	/// The entry is marked in the same critical section, so a concurrent or repeated attempt
	/// fails with [`Error::RequestNotReady`] until the returned claim settles it in a terminal
	/// state.
	pub fn begin_redemption(
		&self,
		id: &str,
		challenge: &str,
		now: OffsetDateTime,
	) -> Result<ProviderRedemption<'_>> {
		let mut map = self.0.lock();
		let id = map.get_key_value(id).map(|(key, _)| key.clone()).ok_or(Error::RequestNotFound)?;
		let entry = lookup(&mut map, &id, challenge)?;

		if entry.expire_if_due(now) {
			return Err(Error::RequestExpired);
		}
		if entry.lifecycle.status != RequestStatus::Completed || entry.redeeming {
			return Err(Error::RequestNotReady);
		}

		let Some(code) = entry.code.clone() else {
			entry.settle(RequestStatus::Failed);

			return Err(Error::RequestInvalid);
		};
		let redemption = ProviderRedemption {
			store: self,
			outcome: RedemptionOutcome::Failed,
			id,
			provider: entry.provider.clone(),
			code,
			pkce_verifier: entry.pkce_verifier.clone(),
		};

		entry.redeeming = true;

		Ok(redemption)
	}

	/// Removes every entry past its purge deadline and returns how many were removed.
	pub fn purge(&self, now: OffsetDateTime) -> usize {
		let mut map = self.0.lock();
		let before = map.len();

		map.retain(|_, entry| !entry.lifecycle.is_deletable(now));

		before - map.len()
	}

	/// Number of live entries.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns true when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}

	// `Redeemed` forces `expired` so the request is single use; `Failed` forces `failed`.
	// Entries that already left `completed` (lazy expiry, purge) are left untouched.
	fn settle_redemption(&self, id: &str, outcome: RedemptionOutcome) {
		let mut map = self.0.lock();
		let Some(entry) = map.get_mut(id) else {
			return;
		};

		if entry.lifecycle.status != RequestStatus::Completed || !entry.redeeming {
			return;
		}

		entry.settle(match outcome {
			RedemptionOutcome::Redeemed => RequestStatus::Expired,
			RedemptionOutcome::Failed => RequestStatus::Failed,
		});
	}
}

fn lookup<'a>(
	map: &'a mut HashMap<RequestId, ProviderEntry>,
	id: &str,
	challenge: &str,
) -> Result<&'a mut ProviderEntry> {
	match map.get_mut(id) {
		Some(entry) if entry.challenge.matches(challenge) => Ok(entry),
		_ => Err(Error::RequestNotFound),
	}
}
