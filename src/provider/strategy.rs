//! Strategy hooks that customize token exchanges and expired-token detection.
//!
//! A strategy decides which API failures mean "the access token expired" and how token endpoint
//! failures are classified.

// self
use crate::{_prelude::*, error::HttpStatusError, provider::descriptor::GrantType};

/// Body marker the API uses to report an expired access token on a `401`.
pub const EXPIRED_TOKEN_MARKER: &str = "Token has expired";

/// Per-API behavior plugged into the client.
///
/// Only [`classify_token_error`](Self::classify_token_error) is mandatory.
pub trait ApiStrategy: Send + Sync {
	/// Decides how a failed token exchange is reported.
	fn classify_token_error(&self, ctx: &TokenErrorContext) -> TokenErrorKind;

	/// Returns `true` when an API failure means the access token expired and a single reactive
	/// refresh should be attempted.
	///
	/// The default matches status `401` plus [`EXPIRED_TOKEN_MARKER`] in the body; a bare `401`
	/// (bad scopes, revoked client) never qualifies.
	fn is_expired_token(&self, error: &HttpStatusError) -> bool {
		error.is_unauthorized() && error.body.contains(EXPIRED_TOKEN_MARKER)
	}

	/// Adds form parameters to every token request of `grant`; does nothing by default.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// How a failed token exchange should be treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// The presented grant was rejected; the user has to sign in again.
	InvalidGrant,
	/// The registered client credentials were rejected.
	InvalidClient,
	/// The grant does not cover the requested scopes.
	InsufficientScope,
	/// Anything else; the exchange may succeed later.
	Transient,
}

/// Facts about a failed token exchange handed to [`ApiStrategy::classify_token_error`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenErrorContext {
	/// Grant that was being exchanged.
	pub grant_type: GrantType,
	/// HTTP status of the token endpoint response.
	pub http_status: Option<u16>,
	/// OAuth `error` code.
	pub oauth_error: Option<String>,
	/// OAuth `error_description`.
	pub error_description: Option<String>,
	/// Truncated body of a response that carried no OAuth error document.
	pub body_preview: Option<String>,
}
impl TokenErrorContext {
	/// Starts an empty context for `grant_type`.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
		}
	}

	/// Records the response status.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Records the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Records the OAuth `error_description`.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Records a preview of a body that was not an OAuth error document.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Strategy for APIs that follow RFC 6749 error reporting.
///
/// The OAuth `error` code decides first, then keywords in the description or raw body, then
/// the HTTP status.
#[derive(Debug, Default)]
pub struct DefaultApiStrategy;
impl ApiStrategy for DefaultApiStrategy {
	fn classify_token_error(&self, ctx: &TokenErrorContext) -> TokenErrorKind {
		ctx.oauth_error
			.as_deref()
			.and_then(kind_for_code)
			.or_else(|| ctx.error_description.as_deref().and_then(kind_for_text))
			.or_else(|| ctx.body_preview.as_deref().and_then(kind_for_text))
			.unwrap_or_else(|| kind_for_status(ctx.http_status))
	}
}

const PREVIEW_CHARS: usize = 256;

const OAUTH_CODES: &[(&str, TokenErrorKind)] = &[
	("invalid_grant", TokenErrorKind::InvalidGrant),
	("access_denied", TokenErrorKind::InvalidGrant),
	("invalid_client", TokenErrorKind::InvalidClient),
	("unauthorized_client", TokenErrorKind::InvalidClient),
	("invalid_scope", TokenErrorKind::InsufficientScope),
	("insufficient_scope", TokenErrorKind::InsufficientScope),
	("temporarily_unavailable", TokenErrorKind::Transient),
	("server_error", TokenErrorKind::Transient),
];

/// Caps `body` at 256 characters, marking the cut with an ellipsis.
pub(crate) fn truncate_preview(body: String) -> String {
	match body.char_indices().nth(PREVIEW_CHARS) {
		Some((cut, _)) => format!("{}…", &body[..cut]),
		None => body,
	}
}

fn kind_for_code(code: &str) -> Option<TokenErrorKind> {
	let code = code.trim();

	OAUTH_CODES.iter().find(|(known, _)| known.eq_ignore_ascii_case(code)).map(|(_, kind)| *kind)
}

fn kind_for_text(text: &str) -> Option<TokenErrorKind> {
	let lowered = text.to_ascii_lowercase();

	OAUTH_CODES.iter().find(|(known, _)| lowered.contains(known)).map(|(_, kind)| *kind)
}

fn kind_for_status(status: Option<u16>) -> TokenErrorKind {
	match status {
		Some(400 | 404 | 410) => TokenErrorKind::InvalidGrant,
		Some(401) => TokenErrorKind::InvalidClient,
		Some(403) => TokenErrorKind::InsufficientScope,
		_ => TokenErrorKind::Transient,
	}
}
