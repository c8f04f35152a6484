//! Proactive and reactive token refresh behind a singleflight guard.
//!
//! Every refresh takes the client's refresh guard, re-reads the store, and only calls the token
//! endpoint when the stored token still needs replacing. Callers that raced past the expiry
//! check therefore wait for the in-flight refresh and reuse its result instead of rotating the
//! refresh token a second time with a stale pair.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	client::{Client, observed},
	error::AuthError,
	obs::{self, OperationKind},
	oauth::TokenGrant,
};

/// Why a refresh was requested.
#[derive(Clone, Copy, Debug)]
pub(crate) enum RefreshTrigger<'a> {
	/// Stored token expires within the configured margin.
	Proactive,
	/// Server rejected `rejected` as expired.
	Reactive { rejected: &'a TokenSecret },
	/// Caller asked for a refresh regardless of expiry.
	Forced,
}
impl RefreshTrigger<'_> {
	fn as_str(self) -> &'static str {
		match self {
			RefreshTrigger::Proactive => "proactive",
			RefreshTrigger::Reactive { .. } => "reactive",
			RefreshTrigger::Forced => "forced",
		}
	}

	fn is_satisfied_by(self, current: &Credentials, margin: Duration) -> bool {
		match self {
			RefreshTrigger::Proactive =>
				!current.will_expire_soon(OffsetDateTime::now_utc(), margin),
			RefreshTrigger::Reactive { rejected } => current.access_token() != Some(rejected),
			RefreshTrigger::Forced => false,
		}
	}
}

impl Client {
	/// Exchanges the stored refresh token for a new token set right away.
	pub async fn refresh_now(&self) -> Result<Credentials> {
		self.refresh(RefreshTrigger::Forced).await
	}

	pub(crate) async fn refresh(&self, trigger: RefreshTrigger<'_>) -> Result<Credentials> {
		observed(OperationKind::Refresh, trigger.as_str(), async move {
			obs::record_refresh_trigger(trigger.as_str());
			self.refresh_metrics.record_attempt();

			let result = self.refresh_serialized(trigger).await;

			match &result {
				Ok(_) => self.refresh_metrics.record_success(),
				Err(err) => {
					self.refresh_metrics.record_failure();
					self.notify_auth_failure(err);
				},
			}

			result
		})
		.await
	}

	async fn refresh_serialized(&self, trigger: RefreshTrigger<'_>) -> Result<Credentials> {
		let _singleflight = self.refresh_guard.lock().await;
		let current = self.store.get().await?;

		if !current.has_access_token() {
			return Err(ErrorKind::NotSignedIn.into());
		}
		if trigger.is_satisfied_by(&current, self.config.min_token_validity) {
			self.refresh_metrics.record_coalesced();

			return Ok(current);
		}

		let refresh_token = current.refresh_token().ok_or(AuthError::MissingRefreshToken)?;
		let grant = self.token_endpoint.refresh(self.strategy.as_ref(), refresh_token).await?;

		self.persist_grant(grant, Some(refresh_token)).await
	}

	/// Stamps `grant`, replaces the whole stored set, and fires the refreshed hook.
	///
	/// Callers must hold the refresh guard.
	pub(crate) async fn persist_grant(
		&self,
		grant: TokenGrant,
		previous_refresh: Option<&TokenSecret>,
	) -> Result<Credentials> {
		let credentials = grant.into_credentials(OffsetDateTime::now_utc(), previous_refresh);

		self.store.put(credentials.clone()).await?;
		self.hooks.refreshed(&credentials);

		Ok(credentials)
	}

	pub(crate) fn notify_auth_failure(&self, err: &Error) {
		match err.kind() {
			ErrorKind::Auth(auth) if auth.requires_sign_in() => self.hooks.sign_in_required(auth),
			_ => {},
		}
	}
}
