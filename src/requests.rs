//! In-memory request stores backing the provider and quick-connect flows.
//!
//! Each store owns a single map behind one mutex. Operations take the current instant
//! explicitly and never hold the lock across an `.await`, so expiry is decided by the caller's
//! clock and provider I/O happens between two short critical sections.

pub mod provider;
pub mod quick_connect;

pub use provider::*;
pub use quick_connect::*;

// self
use crate::_prelude::*;

const DEFAULT_REQUEST_TTL_SECS: u64 = 5 * 60;
const DEFAULT_GRACE_SECS: u64 = 10 * 60;

/// Lifecycle status shared by both request kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
	/// Waiting for the provider callback or the claiming session.
	Pending,
	/// Proven complete and redeemable once.
	Completed,
	/// Deadline passed or already redeemed.
	Expired,
	/// Provider or redemption failure; the caller must restart.
	Failed,
}
impl RequestStatus {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestStatus::Pending => "pending",
			RequestStatus::Completed => "completed",
			RequestStatus::Expired => "expired",
			RequestStatus::Failed => "failed",
		}
	}

	/// Returns true once no operation may change the status again.
	pub const fn is_terminal(self) -> bool {
		matches!(self, RequestStatus::Expired | RequestStatus::Failed)
	}
}
impl Display for RequestStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How long requests stay usable and how long they linger for late polls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryPolicy {
	/// Seconds after creation before a request can no longer be completed or redeemed.
	pub request_ttl_secs: u64,
	/// Seconds after expiry before the entry is purged.
	pub grace_secs: u64,
}
impl ExpiryPolicy {
	/// Computes both deadlines for a request created at `now`.
	pub fn deadlines(&self, now: OffsetDateTime) -> Deadlines {
		let expires = now + secs(self.request_ttl_secs);

		Deadlines { expires, delete_at: expires + secs(self.grace_secs) }
	}
}
impl Default for ExpiryPolicy {
	fn default() -> Self {
		Self { request_ttl_secs: DEFAULT_REQUEST_TTL_SECS, grace_secs: DEFAULT_GRACE_SECS }
	}
}

/// Expiry and purge instants of one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadlines {
	/// Instant after which the request can no longer be completed or redeemed.
	pub expires: OffsetDateTime,
	/// Instant after which the entry is removed; never earlier than `expires`.
	pub delete_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug)]
struct Lifecycle {
	status: RequestStatus,
	deadlines: Deadlines,
}
impl Lifecycle {
	fn pending(deadlines: Deadlines) -> Self {
		Self { status: RequestStatus::Pending, deadlines }
	}

	/// Moves a live request to `expired` once its deadline has passed.
	///
	/// Returns true when this call performed the transition.
	fn expire_if_due(&mut self, now: OffsetDateTime) -> bool {
		if !self.status.is_terminal() && now > self.deadlines.expires {
			self.status = RequestStatus::Expired;

			true
		} else {
			false
		}
	}

	fn is_deletable(&self, now: OffsetDateTime) -> bool {
		now > self.deadlines.delete_at
	}
}

fn secs(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}
