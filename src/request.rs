//! Immutable descriptions of one API call plus the helpers that assemble them.
//!
//! A [`RequestDescriptor`] holds everything the transport needs to perform an exchange: verb,
//! URL, headers, a body writer that is re-run on every attempt, a response parser, and the
//! expected success status. Descriptors are cheap to clone so retries, reactive refreshes, and
//! pagination can replay them.

// std
use std::io;
// crates.io
use reqwest::{
	Method,
	header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
use time::{UtcOffset, macros::format_description};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ParseError},
	page::Page,
	transport::{CancellationToken, ProgressFn},
};

/// Writes the request body into the provided sink.
pub type BodyWriter = Arc<dyn Fn(&mut Vec<u8>) -> io::Result<()> + Send + Sync>;
/// Turns the fully-read response body into the caller's value.
pub type ResponseParser<T> = Arc<dyn Fn(&[u8]) -> Result<T, ParseError> + Send + Sync>;

/// Immutable, replayable description of one endpoint call.
pub struct RequestDescriptor<T> {
	method: Method,
	url: Url,
	headers: HeaderMap,
	body: Option<BodyWriter>,
	parser: ResponseParser<T>,
	expected_status: u16,
	progress: Option<ProgressFn>,
	cancellation: Option<CancellationToken>,
}
impl RequestDescriptor<()> {
	/// Starts building a descriptor for `method` on `url`.
	pub fn builder(method: Method, url: Url) -> RequestDescriptorBuilder {
		RequestDescriptorBuilder::new(method, url)
	}

	/// Shorthand for a `GET` builder.
	pub fn get(url: Url) -> RequestDescriptorBuilder {
		RequestDescriptorBuilder::new(Method::GET, url)
	}
}
impl<T> RequestDescriptor<T> {
	/// HTTP verb.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Target URL of the first hop.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Headers sent on every hop, excluding `Authorization`.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Status code that counts as success.
	pub fn expected_status(&self) -> u16 {
		self.expected_status
	}

	/// Cancellation token polled while the body is read, if any.
	pub fn cancellation(&self) -> Option<&CancellationToken> {
		self.cancellation.as_ref()
	}

	/// Returns a copy of this descriptor targeting the `page` cursor.
	pub fn for_page(&self, page: &Page) -> Self {
		Self { url: page.url().clone(), ..self.clone() }
	}

	/// Returns a copy of this descriptor observing `token`.
	pub fn with_cancellation(&self, token: CancellationToken) -> Self {
		Self { cancellation: Some(token), ..self.clone() }
	}

	pub(crate) fn write_body(&self) -> Result<Option<Vec<u8>>, ConfigError> {
		let Some(writer) = &self.body else {
			return Ok(None);
		};
		let mut sink = Vec::new();

		writer(&mut sink).map_err(|source| ConfigError::BodyWrite { source })?;

		Ok(Some(sink))
	}

	pub(crate) fn parse(&self, body: &[u8]) -> Result<T, ParseError> {
		(self.parser)(body)
	}

	pub(crate) fn progress(&self) -> Option<&ProgressFn> {
		self.progress.as_ref()
	}
}
impl<T> Clone for RequestDescriptor<T> {
	fn clone(&self) -> Self {
		Self {
			method: self.method.clone(),
			url: self.url.clone(),
			headers: self.headers.clone(),
			body: self.body.clone(),
			parser: self.parser.clone(),
			expected_status: self.expected_status,
			progress: self.progress.clone(),
			cancellation: self.cancellation.clone(),
		}
	}
}
impl<T> Debug for RequestDescriptor<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestDescriptor")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &self.headers)
			.field("has_body", &self.body.is_some())
			.field("expected_status", &self.expected_status)
			.finish_non_exhaustive()
	}
}

/// Builder for [`RequestDescriptor`] values; the parser choice finishes the build.
pub struct RequestDescriptorBuilder {
	method: Method,
	url: Url,
	headers: Vec<(String, String)>,
	body: Option<BodyWriter>,
	expected_status: u16,
	progress: Option<ProgressFn>,
	cancellation: Option<CancellationToken>,
	invalid_header: Option<String>,
}
impl RequestDescriptorBuilder {
	fn new(method: Method, url: Url) -> Self {
		Self {
			method,
			url,
			headers: Vec::new(),
			body: None,
			expected_status: 200,
			progress: None,
			cancellation: None,
			invalid_header: None,
		}
	}

	/// Adds a header sent on every hop.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Sets the `Content-Type` header.
	pub fn content_type(self, value: impl Into<String>) -> Self {
		self.header(CONTENT_TYPE.as_str(), value)
	}

	/// Adds a conditional-update guard formatted as an HTTP-date.
	pub fn if_unmodified_since(mut self, instant: OffsetDateTime) -> Self {
		let http_date = format_description!(
			"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
		);

		match instant.to_offset(UtcOffset::UTC).format(http_date) {
			Ok(value) => self.header("If-Unmodified-Since", value),
			Err(_) => {
				self.invalid_header.get_or_insert_with(|| "If-Unmodified-Since".into());

				self
			},
		}
	}

	/// Installs a raw body writer; it runs once per attempt.
	pub fn body(
		mut self,
		writer: impl Fn(&mut Vec<u8>) -> io::Result<()> + Send + Sync + 'static,
	) -> Self {
		self.body = Some(Arc::new(writer));

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
	pub fn json_body<B>(self, value: B) -> Self
	where
		B: 'static + Send + Sync + Serialize,
	{
		self.content_type("application/json")
			.body(move |sink| serde_json::to_writer(sink, &value).map_err(io::Error::from))
	}

	/// Sets the status code that counts as success (defaults to 200).
	pub fn expected_status(mut self, status: u16) -> Self {
		self.expected_status = status;

		self
	}

	/// Registers a percentage progress callback for the response body.
	pub fn progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
		self.progress = Some(Arc::new(callback));

		self
	}

	/// Makes the body read observe `token`.
	pub fn cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = Some(token);

		self
	}

	/// Finishes with a custom parser.
	pub fn parser<T>(
		self,
		parser: impl Fn(&[u8]) -> Result<T, ParseError> + Send + Sync + 'static,
	) -> Result<RequestDescriptor<T>, ConfigError> {
		if let Some(name) = self.invalid_header {
			return Err(ConfigError::InvalidHeader { name });
		}

		let mut headers = HeaderMap::with_capacity(self.headers.len());

		for (name, value) in self.headers {
			let header_name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;
			let header_value = HeaderValue::from_str(&value)
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;

			headers.append(header_name, header_value);
		}

		Ok(RequestDescriptor {
			method: self.method,
			url: self.url,
			headers,
			body: self.body,
			parser: Arc::new(parser),
			expected_status: self.expected_status,
			progress: self.progress,
			cancellation: self.cancellation,
		})
	}

	/// Finishes with a JSON parser for `T`.
	pub fn json<T>(self) -> Result<RequestDescriptor<T>, ConfigError>
	where
		T: 'static + DeserializeOwned,
	{
		self.parser(parse_json::<T>)
	}

	/// Finishes with a parser that ignores the body.
	pub fn no_content(self) -> Result<RequestDescriptor<()>, ConfigError> {
		self.parser(|_| Ok(()))
	}

	/// Finishes with a parser returning the raw body.
	pub fn bytes(self) -> Result<RequestDescriptor<Vec<u8>>, ConfigError> {
		self.parser(|body| Ok(body.to_vec()))
	}
}

/// Deserializes a JSON body, reporting the failing path and the offending content.
pub fn parse_json<T>(body: &[u8]) -> Result<T, ParseError>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| ParseError::Body {
		content: String::from_utf8_lossy(body).into_owned(),
		source,
	})
}
