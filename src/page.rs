//! Pagination cursors and the metadata extracted from successful responses.

// crates.io
use reqwest::header::{DATE, HeaderMap, LINK};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ParseError};

/// Opaque continuation URL pointing at the next page of a listing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Page(Url);
impl Page {
	/// Wraps an absolute continuation URL.
	pub fn new(url: Url) -> Self {
		Self(url)
	}

	/// Returns the cursor as a URL.
	pub fn url(&self) -> &Url {
		&self.0
	}

	/// Returns the cursor as a string slice.
	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}
}
impl Display for Page {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Parsed resource bundled with the response metadata callers need.
#[derive(Clone, Debug)]
pub struct RequestOutcome<T> {
	/// Value produced by the request's response parser.
	pub resource: T,
	/// Server clock reading taken from the `Date` header.
	pub server_date: Option<OffsetDateTime>,
	/// Cursor for the next page; absence means the listing is complete.
	pub next_page: Option<Page>,
}
impl<T> RequestOutcome<T> {
	/// Transforms the resource while keeping the metadata.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestOutcome<U> {
		RequestOutcome {
			resource: f(self.resource),
			server_date: self.server_date,
			next_page: self.next_page,
		}
	}

	/// Returns `true` when another page can be requested.
	pub fn has_next_page(&self) -> bool {
		self.next_page.is_some()
	}
}

/// Extracts the `rel="next"` cursor from `Link` headers.
///
/// Each `<...>` entry whose parameters mention `next` qualifies; the cursor is the text between
/// the brackets. Entries that do not parse are skipped.
pub fn parse_next_page(headers: &HeaderMap) -> Option<Page> {
	headers
		.get_all(LINK)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split('<').skip(1))
		.filter_map(|entry| entry.split_once('>'))
		.filter(|(_, params)| params.contains("next"))
		.find_map(|(target, _)| Url::parse(target.trim()).ok().map(Page))
}

/// Parses the `Date` header as an RFC 2822 / IMF-fixdate timestamp.
pub fn parse_server_date(headers: &HeaderMap) -> Result<Option<OffsetDateTime>, ParseError> {
	let Some(value) = headers.get(DATE) else {
		return Ok(None);
	};
	let raw = value.to_str().map_err(|_| ParseError::Header {
		name: "Date",
		value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
	})?;

	OffsetDateTime::parse(raw.trim(), &Rfc2822)
		.map(Some)
		.map_err(|_| ParseError::Header { name: "Date", value: raw.to_owned() })
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	use time::macros::datetime;
	// self
	use super::*;

	fn headers(pairs: &[(reqwest::header::HeaderName, &str)]) -> HeaderMap {
		let mut map = HeaderMap::new();

		for (name, value) in pairs {
			map.append(
				name.clone(),
				HeaderValue::from_str(value).expect("Header fixture should be valid."),
			);
		}

		map
	}

	#[test]
	fn next_cursor_is_text_between_angle_brackets() {
		let map = headers(&[(
			LINK,
			"<https://api.example.com/files?cursor=abc&limit=50>; rel=\"next\"",
		)]);
		let page = parse_next_page(&map).expect("Link header should yield a cursor.");

		assert_eq!(page.as_str(), "https://api.example.com/files?cursor=abc&limit=50");
	}

	#[test]
	fn next_cursor_is_found_among_several_entries() {
		let map = headers(&[(
			LINK,
			"<https://api.example.com/files?page=1>; rel=\"first\", \
			 <https://api.example.com/files?page=3>; rel=\"next\"",
		)]);

		assert_eq!(
			parse_next_page(&map).map(|page| page.to_string()),
			Some("https://api.example.com/files?page=3".into())
		);
	}

	#[test]
	fn missing_or_malformed_link_yields_no_cursor() {
		assert!(parse_next_page(&HeaderMap::new()).is_none());
		assert!(parse_next_page(&headers(&[(LINK, "rel=\"next\" no brackets")])).is_none());
		assert!(parse_next_page(&headers(&[(LINK, "<not a url>; rel=\"next\"")])).is_none());
		assert!(
			parse_next_page(&headers(&[(LINK, "<https://api.example.com/p2>; rel=\"prev\"")]))
				.is_none()
		);
	}

	#[test]
	fn server_date_parses_http_dates() {
		let map = headers(&[(DATE, "Tue, 15 Nov 1994 08:12:31 GMT")]);

		assert_eq!(
			parse_server_date(&map).expect("Date header should parse."),
			Some(datetime!(1994-11-15 08:12:31 UTC))
		);
		assert_eq!(parse_server_date(&HeaderMap::new()).expect("Missing date is fine."), None);
	}

	#[test]
	fn invalid_server_date_is_a_header_parse_error() {
		let map = headers(&[(DATE, "yesterday")]);

		assert!(matches!(
			parse_server_date(&map),
			Err(ParseError::Header { name: "Date", ref value }) if value == "yesterday"
		));
	}
}
