//! Client-level error types shared by the authorization, transport, and storage layers.

// self
use crate::{_prelude::*, provider::truncate_preview};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Every value records the instant it was captured. The timestamp is appended to the rendered
/// message so support diagnostics can line a failure up with server-side logs.
pub struct Error {
	kind: ErrorKind,
	occurred_at: OffsetDateTime,
}
impl Error {
	/// Wraps a kind, stamping it with the current UTC instant.
	pub fn new(kind: ErrorKind) -> Self {
		Self { kind, occurred_at: OffsetDateTime::now_utc() }
	}

	/// Returns the classified failure.
	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	/// Consumes the error and returns the classified failure.
	pub fn into_kind(self) -> ErrorKind {
		self.kind
	}

	/// Instant the failure was captured.
	pub fn occurred_at(&self) -> OffsetDateTime {
		self.occurred_at
	}

	/// Returns `true` when an authorized call was attempted without stored credentials.
	pub fn is_not_signed_in(&self) -> bool {
		matches!(self.kind, ErrorKind::NotSignedIn)
	}

	/// Returns `true` when the application has to run a fresh sign-in before retrying.
	pub fn requires_sign_in(&self) -> bool {
		match &self.kind {
			ErrorKind::NotSignedIn => true,
			ErrorKind::Auth(inner) => inner.requires_sign_in(),
			_ => false,
		}
	}

	/// Returns the HTTP error details when the server answered with an unexpected status.
	pub fn as_http_status(&self) -> Option<&HttpStatusError> {
		match &self.kind {
			ErrorKind::HttpStatus(inner) => Some(inner),
			_ => None,
		}
	}

	/// Returns the unexpected HTTP status code, if that is what failed.
	pub fn http_status(&self) -> Option<u16> {
		self.as_http_status().map(|inner| inner.status)
	}
}
impl Debug for Error {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Error")
			.field("kind", &self.kind)
			.field("occurred_at", &self.occurred_at)
			.finish()
	}
}
impl Display for Error {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} ({})", self.kind, self.occurred_at)
	}
}
impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.kind.source()
	}
}

macro_rules! impl_from_kind {
	($($source:ty),+ $(,)?) => {
		$(
			impl From<$source> for Error {
				fn from(e: $source) -> Self {
					Self::new(ErrorKind::from(e))
				}
			}
		)+
	};
}

impl_from_kind! {
	ErrorKind,
	AuthError,
	HttpStatusError,
	TransportError,
	ParseError,
	RedirectError,
	ConfigError,
	crate::store::StoreError,
}

/// Failure classes surfaced to callers.
#[derive(Debug, ThisError)]
pub enum ErrorKind {
	/// An authorized call was made before any access token was stored.
	#[error("No access token is stored; sign in before issuing authorized requests.")]
	NotSignedIn,
	/// Token endpoint exchange failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Server answered with a status the request did not expect.
	#[error(transparent)]
	HttpStatus(#[from] HttpStatusError),
	/// Connection-level failure that survived every retry.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body or headers did not have the expected structure.
	#[error(transparent)]
	Parse(#[from] ParseError),
	/// Redirect could not be followed safely.
	#[error(transparent)]
	Redirect(#[from] RedirectError),
	/// Caller cancelled the response stream while it was being read.
	#[error("Reading the response from {url} was cancelled.")]
	Cancelled {
		/// URL whose response was being consumed.
		url: String,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
}

/// Unexpected HTTP status returned by the API.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Server returned HTTP {status} for {url}: {}", truncate_preview(.body.clone()))]
pub struct HttpStatusError {
	/// Numeric status code.
	pub status: u16,
	/// URL of the exchange that failed.
	pub url: String,
	/// Response body (or error stream) kept for diagnostics.
	pub body: String,
}
impl HttpStatusError {
	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}
}

/// Token endpoint failures raised while refreshing or signing in.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Token endpoint rejected the presented refresh token, code, or password.
	#[error("Token endpoint rejected the grant: {reason}.")]
	InvalidGrant {
		/// Reason reported by the token endpoint.
		reason: String,
	},
	/// Client authentication failed or the client credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Reason reported by the token endpoint.
		reason: String,
	},
	/// Token endpoint refused the requested scopes.
	#[error("Token endpoint refused the requested scopes: {reason}.")]
	InsufficientScope {
		/// Reason reported by the token endpoint.
		reason: String,
	},
	/// Stored credentials cannot be refreshed.
	#[error("Stored credentials do not include a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned a zero, negative, or unrepresentable `expires_in`.
	#[error("The expires_in value is outside the supported range.")]
	ExpiresInOutOfRange,
	/// Authorization redirect carried a different `state` than the session issued.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// Token endpoint failed in a way a later attempt may not repeat.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl AuthError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` when retrying cannot help and the user must sign in again.
	pub fn requires_sign_in(&self) -> bool {
		matches!(
			self,
			Self::InvalidGrant { .. }
				| Self::InvalidClient { .. }
				| Self::InsufficientScope { .. }
				| Self::MissingRefreshToken
				| Self::StateMismatch
		)
	}
}

/// Connection-level failures (DNS, TCP, TLS, timeouts, truncated streams).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Every attempt allowed for the exchange failed at the connection level.
	#[error("I/O error while calling {url}; gave up after {attempts} attempt(s).")]
	Exhausted {
		/// URL of the failing exchange.
		url: String,
		/// Number of attempts performed.
		attempts: u32,
		/// Failure observed on the final attempt.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps the final attempt's failure.
	pub fn exhausted(
		url: &Url,
		attempts: u32,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Exhausted { url: url.to_string(), attempts, source: Box::new(src) }
	}
}

/// Response content that did not match what the request expected.
#[derive(Debug, ThisError)]
pub enum ParseError {
	/// JSON body failed to deserialize.
	#[error("Response body did not match the expected structure: {}", truncate_preview(.content.clone()))]
	Body {
		/// Offending body, lossily decoded as UTF-8.
		content: String,
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A metadata header carried a value that could not be parsed.
	#[error("Response header {name} could not be parsed: {value}.")]
	Header {
		/// Header name.
		name: &'static str,
		/// Raw header value.
		value: String,
	},
	/// Custom parser rejected the body.
	#[error("Response body could not be parsed ({message}): {}", truncate_preview(.content.clone()))]
	Custom {
		/// Offending body, lossily decoded as UTF-8.
		content: String,
		/// Parser-supplied reason.
		message: String,
	},
}
impl ParseError {
	/// Builds a [`ParseError::Custom`] from raw body bytes.
	pub fn custom(body: &[u8], message: impl Into<String>) -> Self {
		Self::Custom { content: String::from_utf8_lossy(body).into_owned(), message: message.into() }
	}
}

/// Redirects that cannot be followed.
#[derive(Debug, ThisError)]
pub enum RedirectError {
	/// Redirect chain exceeded the configured hop limit.
	#[error("Stopped following redirects from {url} after {hops} hops.")]
	TooManyRedirects {
		/// URL of the last redirect response.
		url: String,
		/// Hops followed before giving up.
		hops: u32,
	},
	/// Redirect status arrived without a usable `Location` header.
	#[error("HTTP {status} redirect from {url} carried no Location header.")]
	MissingLocation {
		/// Redirect status code.
		status: u16,
		/// URL that answered with the redirect.
		url: String,
	},
	/// `Location` header could not be resolved to a URL.
	#[error("Redirect location {location} is not a valid URL.")]
	InvalidLocation {
		/// Raw `Location` header value.
		location: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}

/// Configuration and validation failures raised locally.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed before anything was sent.
	#[error("HTTP request could not be built.")]
	HttpRequest {
		/// Underlying builder failure.
		#[source]
		source: BoxError,
	},
	/// Request header name or value is not valid HTTP.
	#[error("Request header {name} is invalid.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Request body writer failed.
	#[error("Request body could not be written.")]
	BodyWrite {
		/// Writer failure.
		#[source]
		source: std::io::Error,
	},
	/// Authorization Code sign-in needs an authorization endpoint.
	#[error("The API descriptor has no authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// API descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ApiDescriptorError),
	/// Redirect URI or endpoint cannot be parsed.
	#[error("Descriptor contains an invalid URL.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a request construction failure inside [`ConfigError`].
	pub fn http_request(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpRequest { source: Box::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::http_request(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rendered_message_carries_capture_timestamp() {
		let err = Error::from(ErrorKind::NotSignedIn);
		let rendered = err.to_string();

		assert!(rendered.starts_with("No access token is stored"));
		assert!(rendered.ends_with(&format!("({})", err.occurred_at())));
		assert!(err.is_not_signed_in());
	}

	#[test]
	fn http_status_accessors_expose_details() {
		let err = Error::from(HttpStatusError {
			status: 404,
			url: "https://api.example.com/documents/7".into(),
			body: "{\"message\":\"Not found\"}".into(),
		});

		assert_eq!(err.http_status(), Some(404));
		assert!(err.to_string().contains("Not found"));
		assert!(!err.as_http_status().is_some_and(HttpStatusError::is_unauthorized));
	}

	#[test]
	fn auth_errors_separate_sign_in_from_retry() {
		assert!(AuthError::InvalidGrant { reason: "revoked".into() }.requires_sign_in());
		assert!(AuthError::MissingRefreshToken.requires_sign_in());
		assert!(
			!AuthError::TokenEndpoint { message: "busy".into(), status: Some(503), retry_after: None }
				.requires_sign_in()
		);
	}

	#[test]
	fn source_chain_reaches_the_underlying_failure() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
		let url = Url::parse("https://api.example.com/files").expect("Fixture URL should parse.");
		let err = Error::from(TransportError::exhausted(&url, 3, io));
		let source = StdError::source(&err).expect("Transport error should expose its cause.");

		assert_eq!(source.to_string(), "reset by peer");
		assert!(err.to_string().contains("after 3 attempt(s)"));
	}
}
