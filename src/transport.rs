//! Physical HTTP exchanges.
//!
//! [`Transport::execute`] runs one logical request to completion. It follows redirects itself
//! so the bearer token is only attached while the target host is the API host, and it retries
//! the whole exchange when the connection fails (connect, TLS, timeout, truncated body). HTTP
//! error statuses are never retried here. Successful bodies are streamed chunk by chunk so
//! progress can be published and cancellation observed.

pub mod progress;

pub use progress::*;

// crates.io
use reqwest::{
	Method, Response, StatusCode,
	header::{HeaderMap, LOCATION},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientConfig,
	error::{ConfigError, HttpStatusError, RedirectError, TransportError},
	obs,
	page::{self, RequestOutcome},
	provider::ApiDescriptor,
	request::RequestDescriptor,
};

/// Executes request descriptors against the API.
#[derive(Clone, Debug)]
pub struct Transport {
	http_client: ReqwestClient,
	descriptor: ApiDescriptor,
	max_attempts: u32,
	max_redirects: u32,
}
impl Transport {
	/// Creates a transport scoped to the descriptor's API host.
	///
	/// `http_client` must not follow redirects on its own; see
	/// [`build_http_client`](crate::http::build_http_client).
	pub fn new(
		http_client: ReqwestClient,
		descriptor: &ApiDescriptor,
		config: &ClientConfig,
	) -> Self {
		Self {
			http_client,
			descriptor: descriptor.clone(),
			max_attempts: config.max_attempts.max(1),
			max_redirects: config.max_redirects,
		}
	}

	/// Performs the exchange described by `request`, authorizing API-host hops with `bearer`.
	pub async fn execute<T>(
		&self,
		request: &RequestDescriptor<T>,
		bearer: Option<&TokenSecret>,
	) -> Result<RequestOutcome<T>> {
		let mut url = request.url().clone();
		let mut method = request.method().clone();
		let mut send_body = true;
		let mut authorize = bearer.is_some();
		let mut hops = 0;

		loop {
			let hop = Hop {
				url: &url,
				method: &method,
				send_body,
				bearer: bearer.filter(|_| authorize),
			};

			match self.exchange(request, hop).await? {
				HopResult::Done(outcome) => return Ok(outcome),
				HopResult::Redirect { status, location } => {
					if hops >= self.max_redirects {
						return Err(
							RedirectError::TooManyRedirects { url: url.to_string(), hops }.into()
						);
					}

					let next = url
						.join(&location)
						.map_err(|source| RedirectError::InvalidLocation { location, source })?;

					hops += 1;
					authorize = bearer.is_some() && self.descriptor.is_api_host(&next);

					if status == StatusCode::SEE_OTHER {
						method = Method::GET;
						send_body = false;
					}

					obs::record_redirect(&next, hops, authorize);

					url = next;
				},
			}
		}
	}

	async fn exchange<T>(
		&self,
		request: &RequestDescriptor<T>,
		hop: Hop<'_>,
	) -> Result<HopResult<T>> {
		let mut attempt = 0;

		loop {
			attempt += 1;

			match self.attempt(request, &hop).await {
				Ok(result) => return Ok(result),
				Err(AttemptError::Io(err)) if attempt < self.max_attempts => {
					obs::record_retry(hop.url, attempt, self.max_attempts, &err);
				},
				Err(AttemptError::Io(err)) =>
					return Err(TransportError::exhausted(hop.url, attempt, err).into()),
				Err(AttemptError::Fatal(err)) => return Err(err),
			}
		}
	}

	async fn attempt<T>(
		&self,
		request: &RequestDescriptor<T>,
		hop: &Hop<'_>,
	) -> Result<HopResult<T>, AttemptError> {
		let mut builder = self
			.http_client
			.request(hop.method.clone(), hop.url.clone())
			.headers(request.headers().clone());

		if let Some(token) = hop.bearer {
			builder = builder.bearer_auth(token.expose());
		}

		let body = if hop.send_body { request.write_body().map_err(AttemptError::fatal)? } else { None };

		if let Some(body) = body {
			builder = builder.body(body);
		}

		let response = builder.send().await.map_err(AttemptError::from_reqwest)?;
		let status = response.status();

		if status.is_redirection() && status != StatusCode::NOT_MODIFIED {
			let location = redirect_location(response.headers()).ok_or_else(|| {
				AttemptError::fatal(RedirectError::MissingLocation {
					status: status.as_u16(),
					url: hop.url.to_string(),
				})
			})?;

			return Ok(HopResult::Redirect { status, location });
		}
		if !status.is_success() || status.as_u16() != request.expected_status() {
			let body = response.text().await.map_err(AttemptError::from_reqwest)?;

			return Err(AttemptError::fatal(HttpStatusError {
				status: status.as_u16(),
				url: hop.url.to_string(),
				body,
			}));
		}

		let server_date =
			page::parse_server_date(response.headers()).map_err(AttemptError::fatal)?;
		let next_page = page::parse_next_page(response.headers());
		let body = read_body(request, hop.url, response).await?;
		let resource = request.parse(&body).map_err(AttemptError::fatal)?;

		Ok(HopResult::Done(RequestOutcome { resource, server_date, next_page }))
	}
}

struct Hop<'a> {
	url: &'a Url,
	method: &'a Method,
	send_body: bool,
	bearer: Option<&'a TokenSecret>,
}

enum HopResult<T> {
	Done(RequestOutcome<T>),
	Redirect { status: StatusCode, location: String },
}

enum AttemptError {
	Io(ReqwestError),
	Fatal(Error),
}
impl AttemptError {
	fn fatal(err: impl Into<Error>) -> Self {
		Self::Fatal(err.into())
	}

	fn from_reqwest(err: ReqwestError) -> Self {
		if err.is_builder() { Self::fatal(ConfigError::http_request(err)) } else { Self::Io(err) }
	}
}

fn redirect_location(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(LOCATION)?.to_str().ok()?.trim();

	(!value.is_empty()).then(|| value.to_owned())
}

async fn read_body<T>(
	request: &RequestDescriptor<T>,
	url: &Url,
	mut response: Response,
) -> Result<Vec<u8>, AttemptError> {
	let total = response.content_length();
	let mut tracker = ProgressTracker::new(request.progress(), total);
	let mut body = Vec::with_capacity(total.unwrap_or_default().min(1 << 20) as usize);

	loop {
		if request.cancellation().is_some_and(CancellationToken::is_cancelled) {
			return Err(AttemptError::fatal(ErrorKind::Cancelled { url: url.to_string() }));
		}

		match response.chunk().await.map_err(AttemptError::from_reqwest)? {
			Some(chunk) => {
				body.extend_from_slice(&chunk);
				tracker.advance(chunk.len());
			},
			None => return Ok(body),
		}
	}
}
