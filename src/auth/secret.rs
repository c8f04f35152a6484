//! Token secret wrapper that redacts itself and wipes its buffer on drop.

// self
use crate::_prelude::*;

/// Literal some servers and serializers leave behind in place of a missing token.
const NULL_LITERAL: &str = "null";

/// Redacted secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the secret is non-empty and not the literal `"null"`.
	pub fn is_usable(&self) -> bool {
		!self.0.is_empty() && self.0 != NULL_LITERAL
	}

	/// Overwrites the buffer with zeroes and leaves the secret empty.
	pub fn wipe(&mut self) {
		let mut bytes = std::mem::take(&mut self.0).into_bytes();

		bytes.fill(0);
		std::hint::black_box(&bytes);
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
impl Drop for TokenSecret {
	fn drop(&mut self) {
		self.wipe();
	}
}
