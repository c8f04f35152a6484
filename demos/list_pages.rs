//! Walks every page of a mock listing endpoint with an access token that is about to expire, so
//! the first call refreshes proactively before fetching page one.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use oauth2_request_core::{
	auth::{ClientCredentials, Credentials},
	client::Client,
	config::{ClientConfig, ClientHooks},
	provider::ApiDescriptor,
	request::RequestDescriptor,
	store::{CredentialStore, MemoryStore},
};

#[derive(Debug, Deserialize)]
struct Entry {
	id: String,
	name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=refresh_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access-2\",\"refresh_token\":\"demo-refresh-2\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let page_two = server.url("/v2/files?page=2");
	let first_page = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/files")
				.query_param_missing("page")
				.header("authorization", "Bearer demo-access-2");
			then.status(200)
				.header("content-type", "application/json")
				.header("link", format!("<{page_two}>; rel=\"next\""))
				.body("[{\"id\":\"1\",\"name\":\"notes.txt\"},{\"id\":\"2\",\"name\":\"photo.jpg\"}]");
		})
		.await;
	let second_page = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/files")
				.query_param("page", "2")
				.header("authorization", "Bearer demo-access-2");
			then.status(200)
				.header("content-type", "application/json")
				.body("[{\"id\":\"3\",\"name\":\"report.pdf\"}]");
		})
		.await;
	let descriptor = ApiDescriptor::builder(Url::parse(&server.url("/v2/"))?)
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.build()?;
	let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::with_credentials(Credentials::new(
		"demo-access-1",
		"demo-refresh-1",
		"bearer",
		OffsetDateTime::now_utc() + Duration::seconds(10),
	)));
	let client = Client::builder(
		descriptor,
		ClientCredentials::new("demo-client", "demo-secret", "https://app.example.com/callback"),
	)
	.store(store)
	.config(ClientConfig::default())
	.hooks(ClientHooks::default().on_refreshed(|credentials| {
		println!("Token refreshed; now valid until {:?}.", credentials.expires_at);
	}))
	.build()?;
	let listing = RequestDescriptor::get(client.descriptor().endpoint("files")?)
		.json::<Vec<Entry>>()?;
	let mut request = listing.clone();

	loop {
		let outcome = client.execute(&request).await?;

		for entry in &outcome.resource {
			println!("{} {}", entry.id, entry.name);
		}

		match outcome.next_page {
			Some(page) => request = listing.for_page(&page),
			None => break,
		}
	}

	token_mock.assert_async().await;
	first_page.assert_async().await;
	second_page.assert_async().await;

	Ok(())
}
