//! Non-interactive halves of signing in and out.
//!
//! The UI that shows the authorize page or asks for a password lives in the application; these
//! helpers build the authorize URL, exchange what the user returned, and persist the resulting
//! token set under the same guard refreshes use.

// self
use crate::{
	_prelude::*,
	auth::{AuthorizationSession, Credentials, TokenSecret},
	client::{Client, observed},
	error::ConfigError,
	obs::OperationKind,
};

impl Client {
	/// Builds an Authorization Code + PKCE session for the descriptor's default scopes.
	///
	/// Send the user agent to [`AuthorizationSession::authorize_url`] and keep the session until
	/// the redirect delivers `state` and `code` to
	/// [`complete_authorization`](Self::complete_authorization).
	pub fn start_authorization(&self) -> Result<AuthorizationSession> {
		let endpoint = self
			.descriptor
			.authorization_endpoint
			.as_ref()
			.ok_or(ConfigError::MissingAuthorizationEndpoint)?;
		let redirect_uri = Url::parse(&self.client_credentials.redirect_uri)
			.map_err(|source| ConfigError::InvalidUrl { source })?;

		Ok(AuthorizationSession::generate(
			endpoint,
			&self.client_credentials.client_id,
			redirect_uri,
			self.descriptor.default_scopes.clone(),
		))
	}

	/// Validates `returned_state` and exchanges `code` for a token set, replacing stored
	/// credentials.
	pub async fn complete_authorization(
		&self,
		session: AuthorizationSession,
		returned_state: &str,
		code: &str,
	) -> Result<Credentials> {
		observed(OperationKind::AuthorizationCode, "complete_authorization", async move {
			session.validate_state(returned_state)?;

			let (redirect_uri, verifier) = session.into_exchange_parts();
			let _singleflight = self.refresh_guard.lock().await;
			let grant = self
				.token_endpoint
				.exchange_code(self.strategy.as_ref(), code, &verifier, &redirect_uri)
				.await?;

			self.persist_grant(grant, None).await
		})
		.await
	}

	/// Signs in with the resource owner password grant, replacing stored credentials.
	pub async fn sign_in_with_password(
		&self,
		username: &str,
		password: impl Into<String>,
	) -> Result<Credentials> {
		let password = TokenSecret::new(password);

		observed(OperationKind::Password, "sign_in_with_password", async {
			let _singleflight = self.refresh_guard.lock().await;
			let grant = self
				.token_endpoint
				.exchange_password(
					self.strategy.as_ref(),
					username,
					&password,
					&self.descriptor.default_scopes,
				)
				.await?;

			self.persist_grant(grant, None).await
		})
		.await
	}

	/// Wipes the stored credentials.
	pub async fn sign_out(&self) -> Result<()> {
		let _singleflight = self.refresh_guard.lock().await;

		Ok(self.store.clear().await?)
	}

	/// Returns `true` when both an access and a refresh token are stored.
	pub async fn is_signed_in(&self) -> Result<bool> {
		Ok(self.store.get().await?.is_signed_in())
	}
}
