//! Client tuning knobs and optional lifecycle hooks.

// self
use crate::{_prelude::*, auth::Credentials, error::AuthError};

/// Invoked with the new credential set after every successful refresh or sign-in.
pub type RefreshedHook = Arc<dyn Fn(&Credentials) + Send + Sync>;
/// Invoked when a token exchange failure means the user has to sign in again.
pub type SignInRequiredHook = Arc<dyn Fn(&AuthError) + Send + Sync>;

/// Tunables shared by every request a client issues.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
	/// Access tokens expiring sooner than this are refreshed before the request is sent.
	pub min_token_validity: Duration,
	/// Attempts per redirect hop before a connection-level failure is surfaced.
	pub max_attempts: u32,
	/// Redirect hops followed before giving up.
	pub max_redirects: u32,
	/// Deadline for establishing a connection.
	pub connect_timeout: Duration,
	/// Deadline for each read on an established connection.
	pub read_timeout: Duration,
	/// `User-Agent` header sent with every request.
	pub user_agent: String,
}
impl ClientConfig {
	/// Overrides the proactive refresh margin.
	pub fn with_min_token_validity(mut self, margin: Duration) -> Self {
		self.min_token_validity = margin;

		self
	}

	/// Overrides the per-hop attempt budget (values below one are treated as one).
	pub fn with_max_attempts(mut self, attempts: u32) -> Self {
		self.max_attempts = attempts;

		self
	}

	/// Overrides the redirect hop limit.
	pub fn with_max_redirects(mut self, hops: u32) -> Self {
		self.max_redirects = hops;

		self
	}

	/// Overrides the connect and read deadlines.
	pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
		self.connect_timeout = connect;
		self.read_timeout = read;

		self
	}

	/// Overrides the `User-Agent` header.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			min_token_validity: Duration::seconds(60),
			max_attempts: 3,
			max_redirects: 5,
			connect_timeout: Duration::seconds(3),
			read_timeout: Duration::seconds(3),
			user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
		}
	}
}

/// Optional callbacks registered at construction.
#[derive(Clone, Default)]
pub struct ClientHooks {
	on_refreshed: Option<RefreshedHook>,
	on_sign_in_required: Option<SignInRequiredHook>,
}
impl ClientHooks {
	/// Registers the callback fired after credentials were replaced.
	pub fn on_refreshed(mut self, hook: impl Fn(&Credentials) + Send + Sync + 'static) -> Self {
		self.on_refreshed = Some(Arc::new(hook));

		self
	}

	/// Registers the callback fired when the user must sign in again.
	pub fn on_sign_in_required(
		mut self,
		hook: impl Fn(&AuthError) + Send + Sync + 'static,
	) -> Self {
		self.on_sign_in_required = Some(Arc::new(hook));

		self
	}

	pub(crate) fn refreshed(&self, credentials: &Credentials) {
		if let Some(hook) = &self.on_refreshed {
			hook(credentials);
		}
	}

	pub(crate) fn sign_in_required(&self, error: &AuthError) {
		if let Some(hook) = &self.on_sign_in_required {
			hook(error);
		}
	}
}
impl Debug for ClientHooks {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientHooks")
			.field("on_refreshed", &self.on_refreshed.is_some())
			.field("on_sign_in_required", &self.on_sign_in_required.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[test]
	fn missing_fields_fall_back_to_defaults() {
		let config: ClientConfig = serde_json::from_str(r#"{"max_redirects":2}"#)
			.expect("Partial config should deserialize.");

		assert_eq!(config.max_redirects, 2);
		assert_eq!(config.max_attempts, 3);
		assert_eq!(config.min_token_validity, Duration::seconds(60));
		assert_eq!(config.connect_timeout, Duration::seconds(3));
	}

	#[test]
	fn hooks_fire_only_when_registered() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let hooks = ClientHooks::default().on_sign_in_required(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		hooks.refreshed(&Credentials::default());
		hooks.sign_in_required(&AuthError::MissingRefreshToken);

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
