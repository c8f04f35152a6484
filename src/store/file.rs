//! File-backed [`CredentialStore`] that survives process restarts.

// std
use std::{
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::Credentials,
	store::{CredentialStore, StoreError, StoreFuture},
};

/// Persists the credential set as JSON, rewriting the file atomically after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Credentials>>,
}
impl FileStore {
	/// Opens (or creates) a store at `path`, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let snapshot = load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn persist(&self, credentials: &Credentials) -> Result<(), StoreError> {
		ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(credentials).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credentials: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");
		write_synced(&tmp_path, File::create(&tmp_path), &serialized)?;

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn erase(&self) -> Result<(), StoreError> {
		if !self.path.exists() {
			return Ok(());
		}

		let len = self
			.path
			.metadata()
			.map_err(|e| StoreError::Backend {
				message: format!("Failed to inspect {}: {e}", self.path.display()),
			})?
			.len();
		let zeroes = vec![0_u8; usize::try_from(len).unwrap_or_default()];

		write_synced(&self.path, OpenOptions::new().write(true).open(&self.path), &zeroes)?;

		fs::remove_file(&self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to remove {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn get(&self) -> StoreFuture<'_, Credentials> {
		Box::pin(async move { Ok(self.inner.read().clone()) })
	}

	fn put(&self, credentials: Credentials) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			self.persist(&credentials)?;
			*guard = credentials;

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.wipe();
			self.erase()
		})
	}
}

fn load_snapshot(path: &Path) -> Result<Credentials, StoreError> {
	if !path.exists() {
		return Ok(Credentials::default());
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	if bytes.is_empty() {
		return Ok(Credentials::default());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

fn write_synced(path: &Path, file: std::io::Result<File>, bytes: &[u8]) -> Result<(), StoreError> {
	let mut file = file.map_err(|e| StoreError::Backend {
		message: format!("Failed to open {}: {e}", path.display()),
	})?;

	file.write_all(bytes).map_err(|e| StoreError::Backend {
		message: format!("Failed to write {}: {e}", path.display()),
	})?;
	file.sync_all().map_err(|e| StoreError::Backend {
		message: format!("Failed to sync {}: {e}", path.display()),
	})
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"oauth2_request_core_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[tokio::test]
	async fn put_and_reload_round_trip() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store.");
		let credentials =
			Credentials::new("access", "refresh", "bearer", datetime!(2030-01-01 12:30 UTC));

		store.put(credentials.clone()).await.expect("Failed to save credentials to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store.");
		let fetched = reopened.get().await.expect("Failed to read credentials from file store.");

		assert_eq!(fetched, credentials);

		reopened.clear().await.expect("Failed to clear file store.");

		assert!(!path.exists());
		assert_eq!(
			reopened.get().await.expect("Failed to read cleared file store."),
			Credentials::default()
		);
	}

	#[tokio::test]
	async fn clear_without_file_is_a_no_op() {
		let store = FileStore::open(temp_path()).expect("Failed to open file store.");

		store.clear().await.expect("Clearing an empty store should succeed.");

		assert!(!store.path().exists());
	}
}
