// self
use crate::{
	cleaner::SweepReport,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"auth_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the result of one cleaner pass.
pub fn record_sweep(report: &SweepReport) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("auth_broker_sweep_removed_total", "store" => "provider")
			.increment(report.provider_requests as u64);
		metrics::counter!("auth_broker_sweep_removed_total", "store" => "quick_connect")
			.increment(report.quick_connect_requests as u64);
	}

	#[cfg(feature = "tracing")]
	tracing::info!(
		provider_requests = report.provider_requests,
		quick_connect_requests = report.quick_connect_requests,
		"running cleanup"
	);

	#[cfg(not(any(feature = "metrics", feature = "tracing")))]
	{
		let _ = report;
	}
}
