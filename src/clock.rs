//! Time sources used for every expiry decision.

// self
use crate::_prelude::*;

/// Source of the current instant.
pub trait Clock
where
	Self: 'static + Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for deterministic expiry tests.
///
/// Clones share the same instant, so a handle kept by a test moves the broker's time as well.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Jumps to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}

	/// Moves the clock forward by `by`.
	pub fn advance(&self, by: Duration) {
		*self.0.lock() += by;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::now_utc())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn manual_clock_is_shared_between_clones() {
		let clock = ManualClock::new(datetime!(2025-01-01 00:00 UTC));
		let handle = clock.clone();

		handle.advance(Duration::minutes(6));

		assert_eq!(clock.now(), datetime!(2025-01-01 00:06 UTC));

		handle.set(datetime!(2030-01-01 00:00 UTC));

		assert_eq!(clock.now(), datetime!(2030-01-01 00:00 UTC));
	}
}
