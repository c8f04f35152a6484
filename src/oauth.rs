//! Token endpoint exchanges built on the `oauth2` crate.
//!
//! [`TokenEndpoint`] is the seam the client refreshes and signs in through; [`BasicTokenEndpoint`]
//! is the default implementation that talks to the descriptor's token URL with reqwest.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	ResourceOwnerPassword, ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, Credentials, TokenSecret},
	error::{AuthError, ConfigError},
	http::{InstrumentedHandle, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		ApiDescriptor, ApiStrategy, ClientAuthMethod, GrantType, TokenErrorContext, TokenErrorKind,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`TokenEndpoint`] exchanges.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenGrant>> + 'a + Send>>;

/// Token set returned by a successful exchange, before it is stamped and stored.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// New bearer token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the endpoint issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the endpoint.
	pub token_type: String,
	/// Relative lifetime of the access token.
	pub expires_in: Duration,
}
impl TokenGrant {
	/// Converts the grant into a complete credential set issued at `issued_at`.
	///
	/// When the endpoint did not rotate the refresh token, `previous_refresh` is carried over so
	/// the stored set stays refreshable.
	pub fn into_credentials(
		self,
		issued_at: OffsetDateTime,
		previous_refresh: Option<&TokenSecret>,
	) -> Credentials {
		Credentials {
			access_token: Some(self.access_token),
			refresh_token: self.refresh_token.or_else(|| previous_refresh.cloned()),
			token_type: Some(self.token_type),
			expires_at: Some(issued_at + self.expires_in),
		}
	}
}

/// Token endpoint operations the client relies on.
pub trait TokenEndpoint
where
	Self: Send + Sync,
{
	/// Exchanges a refresh token for a new token set.
	fn refresh<'a>(
		&'a self,
		strategy: &'a dyn ApiStrategy,
		refresh_token: &'a TokenSecret,
	) -> TokenFuture<'a>;

	/// Exchanges an authorization code and its PKCE verifier.
	fn exchange_code<'a>(
		&'a self,
		strategy: &'a dyn ApiStrategy,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
	) -> TokenFuture<'a>;

	/// Performs the resource owner password credentials grant.
	fn exchange_password<'a>(
		&'a self,
		strategy: &'a dyn ApiStrategy,
		username: &'a str,
		password: &'a TokenSecret,
		scopes: &'a [String],
	) -> TokenFuture<'a>;
}

/// [`TokenEndpoint`] backed by `oauth2`'s basic client and reqwest.
pub struct BasicTokenEndpoint {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestClient,
}
impl BasicTokenEndpoint {
	/// Configures the exchange client for `descriptor` and the registered client credentials.
	pub fn new(
		descriptor: &ApiDescriptor,
		client: &ClientCredentials,
		http_client: ReqwestClient,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(descriptor.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidUrl { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(client.client_id.clone()))
			.set_token_uri(token_url)
			.set_client_secret(ClientSecret::new(client.client_secret.expose().to_owned()));

		if !client.redirect_uri.is_empty() {
			let redirect_url = RedirectUrl::new(client.redirect_uri.clone())
				.map_err(|source| ConfigError::InvalidUrl { source })?;

			oauth_client = oauth_client.set_redirect_uri(redirect_url);
		}
		if matches!(descriptor.client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client })
	}

	fn handle(&self, slot: &ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.http_client.clone(), slot.clone())
	}
}
impl TokenEndpoint for BasicTokenEndpoint {
	fn refresh<'a>(
		&'a self,
		strategy: &'a dyn ApiStrategy,
		refresh_token: &'a TokenSecret,
	) -> TokenFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.handle(&meta);
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

			for (key, value) in extra_params(strategy, GrantType::RefreshToken) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(strategy, GrantType::RefreshToken, meta.take(), err)
			})?;

			map_token_response(response)
		})
	}

	fn exchange_code<'a>(
		&'a self,
		strategy: &'a dyn ApiStrategy,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
	) -> TokenFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.handle(&meta);
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|source| ConfigError::InvalidUrl { source })?;
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			for (key, value) in extra_params(strategy, GrantType::AuthorizationCode) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(strategy, GrantType::AuthorizationCode, meta.take(), err)
			})?;

			map_token_response(response)
		})
	}

	fn exchange_password<'a>(
		&'a self,
		strategy: &'a dyn ApiStrategy,
		username: &'a str,
		password: &'a TokenSecret,
		scopes: &'a [String],
	) -> TokenFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let handle = self.handle(&meta);
			let username = ResourceOwnerUsername::new(username.to_owned());
			let password = ResourceOwnerPassword::new(password.expose().to_owned());
			let mut request = self.oauth_client.exchange_password(&username, &password);

			for scope in scopes {
				request = request.add_scope(Scope::new(scope.clone()));
			}
			for (key, value) in extra_params(strategy, GrantType::Password) {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&handle).await.map_err(|err| {
				map_request_error(strategy, GrantType::Password, meta.take(), err)
			})?;

			map_token_response(response)
		})
	}
}

fn extra_params(strategy: &dyn ApiStrategy, grant: GrantType) -> BTreeMap<String, String> {
	let mut form = BTreeMap::new();

	strategy.augment_token_request(grant, &mut form);

	form
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = response.expires_in().ok_or(AuthError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in)
		.ok()
		.filter(|secs| *secs > 0)
		.ok_or(AuthError::ExpiresInOutOfRange)?;

	Ok(TokenGrant {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned())),
		token_type: response.token_type().as_ref().to_owned(),
		expires_in: Duration::seconds(expires_in),
	})
}

fn map_request_error(
	strategy: &dyn ApiStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let status = meta.as_ref().and_then(|value| value.status);
	let retry_after = meta.as_ref().and_then(|value| value.retry_after);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, status, retry_after).into(),
		RequestTokenError::Request(error) => map_transport_error(error, status, retry_after),
		RequestTokenError::Parse(source, body) => match status {
			Some(code) if code >= 400 => {
				let ctx = TokenErrorContext::new(grant)
					.with_http_status(code)
					.with_body_preview(String::from_utf8_lossy(&body).into_owned());
				let message = format!("HTTP {code} without an OAuth error body");

				classify(strategy, &ctx, message, status, retry_after).into()
			},
			_ => AuthError::MalformedResponse { source, status }.into(),
		},
		RequestTokenError::Other(message) =>
			AuthError::TokenEndpoint { message, status, retry_after }.into(),
	}
}

fn map_server_response_error(
	strategy: &dyn ApiStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> AuthError {
	let mut ctx =
		TokenErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_owned());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = status {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	classify(strategy, &ctx, message, status, retry_after)
}

fn classify(
	strategy: &dyn ApiStrategy,
	ctx: &TokenErrorContext,
	message: String,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> AuthError {
	match strategy.classify_token_error(ctx) {
		TokenErrorKind::InvalidGrant => AuthError::InvalidGrant { reason: message },
		TokenErrorKind::InvalidClient => AuthError::InvalidClient { reason: message },
		TokenErrorKind::InsufficientScope => AuthError::InsufficientScope { reason: message },
		TokenErrorKind::Transient => AuthError::TokenEndpoint { message, status, retry_after },
	}
}

fn map_transport_error(
	err: HttpClientError<ReqwestError>,
	status: Option<u16>,
	retry_after: Option<Duration>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) if inner.is_builder() =>
			ConfigError::http_request(*inner).into(),
		HttpClientError::Reqwest(inner) => AuthError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => AuthError::network(inner).into(),
		HttpClientError::Other(message) =>
			AuthError::TokenEndpoint { message, status, retry_after }.into(),
		_ => AuthError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
			retry_after,
		}
		.into(),
	}
}
