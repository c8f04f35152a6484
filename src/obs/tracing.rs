// self
use crate::{_prelude::*, obs::OperationKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// Span wrapping one client operation.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the operation kind + stage.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_request_core.operation",
				operation = kind.as_str(),
				stage
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Reports a connection-level failure that is about to be retried.
pub fn record_retry(url: &Url, attempt: u32, max_attempts: u32, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			url = url.as_str(),
			attempt,
			max_attempts,
			%error,
			"Retrying after I/O failure."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (url, attempt, max_attempts, error);
	}
}

/// Reports a followed redirect and whether the bearer token travels with it.
pub fn record_redirect(target: &Url, hop: u32, keeps_authorization: bool) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			host = target.host_str().unwrap_or_default(),
			hop,
			keeps_authorization,
			"Following redirect."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (target, hop, keeps_authorization);
	}
}

/// Reports why a refresh is starting (`proactive` or `reactive`).
pub fn record_refresh_trigger(trigger: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(trigger, "Refreshing access token.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = trigger;
	}
}
