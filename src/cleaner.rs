//! Periodic purge of requests past their deletion deadline.
//!
//! The cleaner only reclaims memory. Expiry is enforced when entries are read, so a slow or
//! stopped cleaner never makes an expired request usable again.

// crates.io
use tokio::{
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
// self
use crate::_prelude::*;

/// Entries removed by one cleaner pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Provider-flow requests removed.
	pub provider_requests: usize,
	/// Quick-connect requests removed.
	pub quick_connect_requests: usize,
}
impl SweepReport {
	/// Total number of removed entries.
	pub fn total(&self) -> usize {
		self.provider_requests + self.quick_connect_requests
	}
}

/// Target of periodic cleaner passes.
pub trait Sweep
where
	Self: 'static + Send + Sync,
{
	/// Removes every deletable entry and reports what was removed.
	fn sweep(&self) -> SweepReport;
}

/// Spawns cleaner tasks.
#[derive(Debug)]
pub struct Cleaner;
impl Cleaner {
	/// Runs `target.sweep()` immediately and then every `interval` until stopped.
	///
	/// Must be called from within a tokio runtime.
	pub fn spawn<S>(target: Arc<S>, interval: std::time::Duration) -> CleanerHandle
	where
		S: ?Sized + Sweep,
	{
		let token = CancellationToken::new();
		let cancelled = token.clone();
		let period = interval.max(std::time::Duration::from_millis(1));
		let task = tokio::spawn(async move {
			let mut ticker = time::interval(period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = cancelled.cancelled() => break,
					_ = ticker.tick() => {
						target.sweep();
					},
				}
			}
		});

		CleanerHandle { token, task }
	}
}

/// Handle owning a running cleaner task.
#[derive(Debug)]
pub struct CleanerHandle {
	token: CancellationToken,
	task: JoinHandle<()>,
}
impl CleanerHandle {
	/// Signals the task to stop without waiting for it.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Returns true once the task has exited.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Stops the task and waits for it to exit.
	pub async fn stop(self) {
		self.token.cancel();

		if let Err(_e) = self.task.await {
			#[cfg(feature = "tracing")]
			tracing::warn!(error = %_e, "cleaner task ended abnormally");
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[derive(Default)]
	struct Counter(AtomicUsize);
	impl Sweep for Counter {
		fn sweep(&self) -> SweepReport {
			self.0.fetch_add(1, Ordering::SeqCst);

			SweepReport::default()
		}
	}

	#[tokio::test(start_paused = true)]
	async fn sweeps_immediately_then_on_every_interval() {
		let counter = Arc::new(Counter::default());
		let handle = Cleaner::spawn(Arc::clone(&counter), std::time::Duration::from_secs(1800));

		tokio::task::yield_now().await;

		assert_eq!(counter.0.load(Ordering::SeqCst), 1);

		time::sleep(std::time::Duration::from_secs(1800)).await;
		tokio::task::yield_now().await;

		assert_eq!(counter.0.load(Ordering::SeqCst), 2);

		handle.stop().await;
		time::sleep(std::time::Duration::from_secs(3600)).await;

		assert_eq!(counter.0.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn report_total_adds_both_stores() {
		assert_eq!(SweepReport { provider_requests: 2, quick_connect_requests: 3 }.total(), 5);
	}
}
