//! HTTP client construction plus the instrumented handle used for token exchanges.
//!
//! Every reqwest client the crate builds refuses to follow redirects on its own: the transport
//! decides per hop whether the bearer token may travel with the request, and token endpoints are
//! expected to answer directly. [`InstrumentedHandle`] adapts reqwest to `oauth2`'s
//! [`AsyncHttpClient`] while recording the status and `Retry-After` hint of each token response
//! in a [`ResponseMetadataSlot`] so error mapping can report them.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, config::ClientConfig, error::ConfigError};

/// Builds the reqwest client used for API and token calls from `config`.
pub fn build_http_client(config: &ClientConfig) -> Result<ReqwestClient, ConfigError> {
	ReqwestClient::builder()
		.redirect(Policy::none())
		.connect_timeout(config.connect_timeout.unsigned_abs())
		.read_timeout(config.read_timeout.unsigned_abs())
		.user_agent(config.user_agent.as_str())
		.build()
		.map_err(ConfigError::http_client_build)
}

/// Metadata captured from the most recent token endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot sharing [`ResponseMetadata`] between the HTTP handle and error mapping.
///
/// A fresh slot is created for each token request and read right after `oauth2` resolves.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// [`AsyncHttpClient`] adapter over reqwest that records response metadata.
#[derive(Clone)]
pub(crate) struct InstrumentedHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
impl InstrumentedHandle {
	pub(crate) fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self { client, slot }
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response =
				self.client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			self.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs)).filter(|delay| !delay.is_negative());
	}

	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
	let delta = moment - OffsetDateTime::now_utc();

	delta.is_positive().then_some(delta)
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;

	fn retry_after(value: &str) -> Option<Duration> {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_str(value).expect("Header should be valid."));

		parse_retry_after(&headers)
	}

	#[test]
	fn retry_after_accepts_delay_seconds() {
		assert_eq!(retry_after("120"), Some(Duration::seconds(120)));
		assert_eq!(retry_after("-5"), None);
	}

	#[test]
	fn retry_after_ignores_past_dates_and_garbage() {
		assert_eq!(retry_after("Tue, 15 Nov 1994 08:12:31 GMT"), None);
		assert_eq!(retry_after("soon"), None);
	}

	#[test]
	fn http_client_builds_from_default_config() {
		assert!(build_http_client(&ClientConfig::default()).is_ok());
	}
}
