// self
use crate::{
	_prelude::*,
	provider::{ApiDescriptor, ClientAuthMethod},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ApiDescriptorError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoints must name a host.
	#[error("The {endpoint} endpoint has no host: {url}.")]
	MissingHost {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ApiDescriptor`] values.
#[derive(Debug)]
pub struct ApiDescriptorBuilder {
	/// Base URL for resource calls.
	pub api_base: Url,
	/// Token endpoint used for refreshes and sign-in exchanges.
	pub token_endpoint: Option<Url>,
	/// Optional authorization endpoint (required for Authorization Code sign-in).
	pub authorization_endpoint: Option<Url>,
	/// Scopes requested when signing in.
	pub default_scopes: Vec<String>,
	/// Client authentication method for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
}
impl ApiDescriptorBuilder {
	/// Creates a new builder seeded with the API base URL.
	pub fn new(api_base: Url) -> Self {
		Self {
			api_base,
			token_endpoint: None,
			authorization_endpoint: None,
			default_scopes: Vec::new(),
			client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Appends one scope requested at sign-in.
	pub fn default_scope(mut self, scope: impl Into<String>) -> Self {
		self.default_scopes.push(scope.into());

		self
	}

	/// Replaces the scopes requested at sign-in.
	pub fn default_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.default_scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ApiDescriptor, ApiDescriptorError> {
		let token_endpoint =
			self.token_endpoint.ok_or(ApiDescriptorError::MissingTokenEndpoint)?;
		let descriptor = ApiDescriptor {
			api_base: self.api_base,
			token_endpoint,
			authorization_endpoint: self.authorization_endpoint,
			default_scopes: self.default_scopes,
			client_auth_method: self.client_auth_method,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}
