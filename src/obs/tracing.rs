//! Flow spans carrying the broker's request and provider context.

// self
use crate::{_prelude::*, auth::ProviderId, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Guard returned by [`FlowSpan::entered`]; the span is exited when it drops.
#[cfg(feature = "tracing")]
pub type FlowSpanGuard = tracing::span::EnteredSpan;
/// Guard returned by [`FlowSpan::entered`]; the span is exited when it drops.
#[cfg(not(feature = "tracing"))]
pub type FlowSpanGuard = ();

/// Span wrapping one broker operation.
///
/// Every span carries `flow` and `stage`. The `provider` and `request` fields start empty and
/// are filled once the operation has resolved them. Quick-connect codes are never recorded since
/// holding one is enough to claim it.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `stage` of the given flow.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self {
				span: tracing::info_span!(
					"auth_broker.flow",
					flow = kind.as_str(),
					stage,
					provider = tracing::field::Empty,
					request = tracing::field::Empty,
				),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Opens the span for one cleaner pass.
	pub fn sweep() -> Self {
		Self::new(FlowKind::Sweep, "sweep")
	}

	/// Tags the span with the provider handling the request.
	pub fn record_provider(&self, provider: &ProviderId) {
		#[cfg(feature = "tracing")]
		self.span.record("provider", provider.as_ref());
		#[cfg(not(feature = "tracing"))]
		let _ = provider;
	}

	/// Tags the span with a provider request id.
	pub fn record_request(&self, request: &str) {
		#[cfg(feature = "tracing")]
		self.span.record("request", request);
		#[cfg(not(feature = "tracing"))]
		let _ = request;
	}

	/// Enters the span for a synchronous operation.
	#[allow(clippy::let_unit_value)]
	pub fn entered(self) -> FlowSpanGuard {
		#[cfg(feature = "tracing")]
		{
			self.span.entered()
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;
		}
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
