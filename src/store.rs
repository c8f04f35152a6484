//! Credential storage contract and the built-in store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::Credentials};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend holding the single credential set a client works with.
///
/// Reads may interleave freely; writes are issued by one refresh at a time, so implementations
/// only need each `put` to replace the whole set atomically.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored credentials, or an empty set when nothing is stored.
	fn get(&self) -> StoreFuture<'_, Credentials>;

	/// Replaces every field of the stored credential set.
	fn put(&self, credentials: Credentials) -> StoreFuture<'_, ()>;

	/// Wipes the stored credential set.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error.kind(), ErrorKind::Storage(_)));
		assert!(error.to_string().contains("disk unavailable"));

		let source = StdError::source(&error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
