//! API descriptor data structures shared by the transport and the token endpoint.

/// Builder API for assembling API descriptors.
pub mod builder;
/// Grant identifiers used by token requests.
pub mod grant;

pub use builder::*;
pub use grant::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Immutable description of the API a client talks to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
	/// Base URL for resource calls; its host is the only one that receives bearer tokens.
	pub api_base: Url,
	/// Token endpoint used for refreshes and sign-in exchanges.
	pub token_endpoint: Url,
	/// Authorization endpoint used by the Authorization Code flow.
	pub authorization_endpoint: Option<Url>,
	/// Scopes requested when signing in.
	pub default_scopes: Vec<String>,
	/// Client authentication mechanism for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
}
impl ApiDescriptor {
	/// Creates a new builder for the provided API base URL.
	pub fn builder(api_base: Url) -> ApiDescriptorBuilder {
		ApiDescriptorBuilder::new(api_base)
	}

	/// Host component of the API base URL.
	pub fn api_host(&self) -> Option<&str> {
		self.api_base.host_str()
	}

	/// Returns `true` when `url` points at the API host.
	pub fn is_api_host(&self, url: &Url) -> bool {
		url.host_str().is_some() && url.host_str() == self.api_host()
	}

	/// Resolves `path` against the API base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.api_base.join(path).map_err(|source| ConfigError::InvalidUrl { source })
	}

	fn validate(&self) -> Result<(), ApiDescriptorError> {
		validate_endpoint("api", &self.api_base)?;
		validate_endpoint("token", &self.token_endpoint)?;

		if let Some(authorization) = self.authorization_endpoint.as_ref() {
			validate_endpoint("authorization", authorization)?;
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ApiDescriptorError> {
	if url.host_str().is_none() {
		return Err(ApiDescriptorError::MissingHost { endpoint: name, url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ApiDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
