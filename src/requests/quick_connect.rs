//! Store for quick-connect (device pairing) requests keyed by a human-enterable code.

// self
use crate::{
	_prelude::*,
	auth::{Secret, UserId, generate_challenge, generate_quick_code, normalize_quick_code},
	requests::{Deadlines, Lifecycle, RequestStatus},
};

const MAX_CODE_ATTEMPTS: usize = 16;

/// Code and challenge handed to the device that started pairing.
#[derive(Clone, Debug)]
pub struct QuickConnectTicket {
	/// Human-enterable code, e.g. `ABCD-1234-EFGH`.
	pub code: String,
	/// Secret required on every status and redemption call.
	pub challenge: Secret,
	/// Expiry and purge instants.
	pub deadlines: Deadlines,
}

#[derive(Debug)]
struct QuickConnectEntry {
	challenge: Secret,
	user: Option<UserId>,
	lifecycle: Lifecycle,
}
impl QuickConnectEntry {
	fn expire_if_due(&mut self, now: OffsetDateTime) -> bool {
		let expired = self.lifecycle.expire_if_due(now);

		if expired {
			self.user = None;
		}

		expired
	}

	fn settle(&mut self, status: RequestStatus) {
		self.lifecycle.status = status;
		self.user = None;
	}
}

/// Concurrency-safe map of quick-connect requests.
#[derive(Debug, Default)]
pub struct QuickConnectStore(Mutex<HashMap<String, QuickConnectEntry>>);
impl QuickConnectStore {
	/// Creates a `pending` request under a fresh code that does not collide with a live one.
	pub fn create(&self, deadlines: Deadlines) -> Result<QuickConnectTicket> {
		let challenge = generate_challenge();
		let mut map = self.0.lock();

		for _ in 0..MAX_CODE_ATTEMPTS {
			let code = generate_quick_code();

			if map.contains_key(&code) {
				continue;
			}

			map.insert(
				code.clone(),
				QuickConnectEntry {
					challenge: challenge.clone(),
					user: None,
					lifecycle: Lifecycle::pending(deadlines),
				},
			);

			return Ok(QuickConnectTicket { code, challenge, deadlines });
		}

		Err(Error::RequestAlreadyExists)
	}

	/// Stores a `pending` request under a caller-chosen code and challenge.
	pub fn insert(&self, code: &str, challenge: Secret, deadlines: Deadlines) -> Result<()> {
		let code = normalize_quick_code(code);
		let mut map = self.0.lock();

		if code.is_empty() || challenge.is_empty() {
			return Err(Error::RequestInvalid);
		}
		if map.contains_key(&code) {
			return Err(Error::RequestAlreadyExists);
		}

		map.insert(
			code,
			QuickConnectEntry { challenge, user: None, lifecycle: Lifecycle::pending(deadlines) },
		);

		Ok(())
	}

	/// Records the user of the authenticated session that typed in `code`.
	///
	/// Does not require the challenge. The first claim wins and later claims are ignored.
	pub fn claim(&self, code: &str, user: UserId, now: OffsetDateTime) -> Result<()> {
		let code = normalize_quick_code(code);
		let mut map = self.0.lock();
		let entry = map.get_mut(&code).ok_or(Error::RequestNotFound)?;

		if entry.expire_if_due(now) {
			return Err(Error::RequestExpired);
		}

		match entry.lifecycle.status {
			RequestStatus::Pending => {
				entry.lifecycle.status = RequestStatus::Completed;
				entry.user = Some(user);

				Ok(())
			},
			RequestStatus::Completed => Ok(()),
			RequestStatus::Expired => Err(Error::RequestExpired),
			RequestStatus::Failed => Err(Error::RequestInvalid),
		}
	}

	/// Reports the status after re-validating expiry.
	pub fn status(
		&self,
		code: &str,
		challenge: &str,
		now: OffsetDateTime,
	) -> Result<RequestStatus> {
		let code = normalize_quick_code(code);
		let mut map = self.0.lock();
		let entry = lookup(&mut map, &code, challenge)?;

		entry.expire_if_due(now);

		Ok(entry.lifecycle.status)
	}

	/// Consumes a `completed` request and returns the user that claimed it.
	///
	/// The request is forced to `expired` in the same critical section, so a concurrent or
	/// repeated call fails with [`Error::RequestNotReady`].
	pub fn redeem(&self, code: &str, challenge: &str, now: OffsetDateTime) -> Result<UserId> {
		let code = normalize_quick_code(code);
		let mut map = self.0.lock();
		let entry = lookup(&mut map, &code, challenge)?;

		if entry.expire_if_due(now) {
			return Err(Error::RequestExpired);
		}
		if entry.lifecycle.status != RequestStatus::Completed {
			return Err(Error::RequestNotReady);
		}

		let Some(user) = entry.user.take() else {
			entry.settle(RequestStatus::Failed);

			return Err(Error::RequestInvalid);
		};

		entry.settle(RequestStatus::Expired);

		Ok(user)
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
}

fn lookup<'a>(
	map: &'a mut HashMap<String, QuickConnectEntry>,
	code: &str,
	challenge: &str,
) -> Result<&'a mut QuickConnectEntry> {
	match map.get_mut(code) {
		Some(entry) if entry.challenge.matches(challenge) => Ok(entry),
		_ => Err(Error::RequestNotFound),
	}
}
