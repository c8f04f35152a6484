//! Authenticated request core for paginated OAuth 2.0 REST APIs.
//!
//! Describe a call once with [`request::RequestDescriptor`]; the [`client::Client`] keeps the
//! bearer token fresh and hands back the parsed resource with its next-page cursor.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod page;
pub mod provider;
pub mod request;
pub mod store;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ClientCredentials, Credentials},
		client::Client,
		config::ClientConfig,
		provider::ApiDescriptor,
		store::{CredentialStore, MemoryStore},
	};

	/// Builds a reqwest client that accepts the self-signed certificates produced by mock
	/// servers during tests and never follows redirects on its own.
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Client credentials fixture shared by integration tests.
	pub fn test_client_credentials() -> ClientCredentials {
		ClientCredentials::new("client-test", "secret-test", "https://app.example.com/callback")
	}

	/// Credentials fixture whose access token stays valid for `valid_for`.
	pub fn credentials_valid_for(access: &str, refresh: &str, valid_for: Duration) -> Credentials {
		Credentials::new(access, refresh, "bearer", OffsetDateTime::now_utc() + valid_for)
	}

	/// Constructs a [`Client`] backed by an in-memory store seeded with `credentials`.
	pub async fn build_test_client(
		descriptor: ApiDescriptor,
		config: ClientConfig,
		credentials: Option<Credentials>,
	) -> (Client, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());

		if let Some(credentials) = credentials {
			store_backend.put(credentials).await.expect("Failed to seed the memory store.");
		}

		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let client = Client::builder(descriptor, test_client_credentials())
			.store(store)
			.config(config)
			.http_client(test_reqwest_client())
			.build()
			.expect("Failed to build the test client.");

		(client, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, ErrorKind, Result};
}

pub use reqwest;
pub use url;
