//! Stored token set plus the application's immutable client credentials.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Token set persisted by a [`CredentialStore`](crate::store::CredentialStore).
///
/// `expires_at` only carries meaning while `access_token` is usable. Every field is replaced
/// together on refresh so the token and its expiry never drift apart.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Bearer token attached to API calls.
	pub access_token: Option<TokenSecret>,
	/// Long-lived secret exchanged for a new access token.
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the token endpoint (normally `bearer`).
	pub token_type: Option<String>,
	/// Absolute expiry instant of the access token.
	pub expires_at: Option<OffsetDateTime>,
}
impl Credentials {
	/// Builds a complete credential set.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		token_type: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			access_token: Some(TokenSecret::new(access_token)),
			refresh_token: Some(TokenSecret::new(refresh_token)),
			token_type: Some(token_type.into()),
			expires_at: Some(expires_at),
		}
	}

	/// Returns the access token when it is usable.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref().filter(|secret| secret.is_usable())
	}

	/// Returns the refresh token when it is usable.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|secret| secret.is_usable())
	}

	/// Returns `true` when an access token is stored.
	pub fn has_access_token(&self) -> bool {
		self.access_token().is_some()
	}

	/// Returns `true` when both tokens are stored, i.e. the user appears signed in.
	pub fn is_signed_in(&self) -> bool {
		self.has_access_token() && self.refresh_token().is_some()
	}

	/// Returns `true` when the access token has no expiry or expires within `margin` of `now`.
	pub fn will_expire_soon(&self, now: OffsetDateTime, margin: Duration) -> bool {
		match self.expires_at {
			Some(expires_at) => expires_at - now < margin,
			None => true,
		}
	}

	/// Zeroes every secret and resets the set to empty.
	pub fn wipe(&mut self) {
		if let Some(secret) = self.access_token.as_mut() {
			secret.wipe();
		}
		if let Some(secret) = self.refresh_token.as_mut() {
			secret.wipe();
		}

		*self = Self::default();
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("token_type", &self.token_type)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// OAuth client registration supplied once at construction.
#[derive(Clone)]
pub struct ClientCredentials {
	/// Registered client identifier.
	pub client_id: String,
	/// Registered client secret.
	pub client_secret: TokenSecret,
	/// Redirect URI registered for the authorization code grant.
	pub redirect_uri: String,
}
impl ClientCredentials {
	/// Bundles the client registration values.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			redirect_uri: redirect_uri.into(),
		}
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("redirect_uri", &self.redirect_uri)
			.finish()
	}
}
