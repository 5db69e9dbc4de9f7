//! Optional observability helpers for broker flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `auth_broker.flow` with the `flow` and
//!   `stage` (operation) fields, `provider` and `request` once known, plus an event for every
//!   cleaner sweep.
//! - Enable `metrics` to increment `auth_broker_flow_total` for every attempt/success/failure
//!   labeled by `flow` + `outcome`, and `auth_broker_sweep_removed_total` labeled by `store`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Third-party OIDC provider login.
	ProviderLogin,
	/// Device pairing via a human-enterable code.
	QuickConnect,
	/// Periodic purge of deletable requests.
	Sweep,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ProviderLogin => "provider_login",
			FlowKind::QuickConnect => "quick_connect",
			FlowKind::Sweep => "sweep",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
