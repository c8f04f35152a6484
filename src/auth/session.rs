//! Authorization Code + PKCE handshake state returned by
//! [`Client::start_authorization`](crate::client::Client::start_authorization).

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, error::AuthError};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;
const PKCE_METHOD: &str = "S256";

/// Handshake metadata the application keeps until the authorization redirect returns.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Opaque value that must round-trip through the redirect.
	pub state: String,
	/// Redirect URI embedded in the authorize URL.
	pub redirect_uri: Url,
	/// Authorize URL the user agent should be sent to.
	pub authorize_url: Url,
	/// Scopes requested by the session.
	pub scopes: Vec<String>,
	verifier: String,
	challenge: String,
}
impl AuthorizationSession {
	pub(crate) fn generate(
		authorization_endpoint: &Url,
		client_id: &str,
		redirect_uri: Url,
		scopes: Vec<String>,
	) -> Self {
		let state = random_string(STATE_LEN);
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);
		let mut authorize_url = authorization_endpoint.clone();

		{
			let mut pairs = authorize_url.query_pairs_mut();

			pairs.append_pair("response_type", "code");
			pairs.append_pair("client_id", client_id);
			pairs.append_pair("redirect_uri", redirect_uri.as_str());

			if !scopes.is_empty() {
				pairs.append_pair("scope", &scopes.join(" "));
			}

			pairs.append_pair("state", &state);
			pairs.append_pair("code_challenge", &challenge);
			pairs.append_pair("code_challenge_method", PKCE_METHOD);
		}

		Self { state, redirect_uri, authorize_url, scopes, verifier, challenge }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.challenge
	}

	/// Validates the `state` returned with the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<(), AuthError> {
		if returned_state == self.state { Ok(()) } else { Err(AuthError::StateMismatch) }
	}

	pub(crate) fn into_exchange_parts(self) -> (Url, String) {
		(self.redirect_uri, self.verifier)
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("scopes", &self.scopes)
			.field("code_challenge", &self.challenge)
			.finish_non_exhaustive()
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
