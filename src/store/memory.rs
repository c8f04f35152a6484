//! Thread-safe in-memory [`CredentialStore`] for tests, demos, and short-lived sessions.

// self
use crate::{
	_prelude::*,
	auth::Credentials,
	store::{CredentialStore, StoreFuture},
};

/// Keeps the credential set in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Credentials>>);
impl MemoryStore {
	/// Creates a store pre-populated with `credentials`.
	pub fn with_credentials(credentials: Credentials) -> Self {
		Self(Arc::new(RwLock::new(credentials)))
	}

	/// Returns a copy of the current credential set without going through the async contract.
	pub fn snapshot(&self) -> Credentials {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self) -> StoreFuture<'_, Credentials> {
		let credentials = self.snapshot();

		Box::pin(async move { Ok(credentials) })
	}

	fn put(&self, credentials: Credentials) -> StoreFuture<'_, ()> {
		*self.0.write() = credentials;

		Box::pin(async { Ok(()) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		self.0.write().wipe();

		Box::pin(async { Ok(()) })
	}
}
