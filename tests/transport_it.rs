// std
use std::sync::atomic::{AtomicU32, Ordering};
// crates.io
use httpmock::prelude::*;
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpListener,
};
// self
use oauth2_request_core::{
	_preludet::*,
	auth::Credentials,
	config::ClientConfig,
	error::{RedirectError, TransportError},
	provider::ApiDescriptor,
	request::RequestDescriptor,
	reqwest::Method,
};

fn descriptor_for(api_base: &str) -> ApiDescriptor {
	let api_base = Url::parse(api_base).expect("API base should parse successfully.");
	let token_endpoint =
		api_base.join("/token").expect("Token endpoint should resolve against the API base.");

	ApiDescriptor::builder(api_base)
		.token_endpoint(token_endpoint)
		.build()
		.expect("API descriptor should build successfully.")
}

fn signed_in() -> Option<Credentials> {
	Some(credentials_valid_for("access-1", "refresh-1", Duration::hours(1)))
}

fn get(url: &str) -> RequestDescriptor<Vec<u8>> {
	RequestDescriptor::get(Url::parse(url).expect("Request URL should parse successfully."))
		.bytes()
		.expect("Request should build successfully.")
}

const TRUNCATED_EXPIRY: &str = "HTTP/1.1 401 Unauthorized\r\ncontent-type: text/plain\r\ncontent-length: 200\r\nconnection: close\r\n\r\nToken has exp";

/// Accepts connections on a loopback port. The first `failures` connections get `failure_reply`
/// (possibly nothing) before being closed; later connections receive a short plain-text body.
async fn spawn_raw_server(failures: u32, failure_reply: &'static str) -> (String, Arc<AtomicU32>) {
	let listener =
		TcpListener::bind("127.0.0.1:0").await.expect("Flaky server should bind a loopback port.");
	let addr = listener.local_addr().expect("Flaky server should report its address.");
	let accepted = Arc::new(AtomicU32::new(0));
	let counter = accepted.clone();

	tokio::spawn(async move {
		while let Ok((mut socket, _)) = listener.accept().await {
			let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
			let mut head = [0_u8; 4096];
			let _ = socket.read(&mut head).await;

			if seen <= failures {
				if !failure_reply.is_empty() {
					let _ = socket.write_all(failure_reply.as_bytes()).await;
					let _ = socket.shutdown().await;
				}

				drop(socket);

				continue;
			}

			let body = "ok";
			let response = format!(
				"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
				body.len()
			);
			let _ = socket.write_all(response.as_bytes()).await;
			let _ = socket.shutdown().await;
		}
	});

	(format!("http://{addr}/"), accepted)
}

async fn spawn_flaky_server(failures: u32) -> (String, Arc<AtomicU32>) {
	spawn_raw_server(failures, "").await
}

#[tokio::test]
async fn same_host_redirect_keeps_the_bearer_token() {
	let server = MockServer::start_async().await;
	let start = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/start").header("authorization", "Bearer access-1");
			then.status(302).header("location", "/v2/final");
		})
		.await;
	let target = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/final").header("authorization", "Bearer access-1");
			then.status(200).body("final");
		})
		.await;
	let (client, _) = build_test_client(
		descriptor_for(&server.url("/v2/")),
		ClientConfig::default(),
		signed_in(),
	)
	.await;
	let outcome = client
		.execute(&get(&server.url("/v2/start")))
		.await
		.expect("Same-host redirect should be followed.");

	assert_eq!(outcome.resource, b"final");

	start.assert_calls_async(1).await;
	target.assert_calls_async(1).await;
}

#[tokio::test]
async fn cross_host_redirect_drops_the_bearer_token() {
	let api = MockServer::start_async().await;
	let storage = MockServer::start_async().await;
	let blob_url = format!("http://localhost:{}/blob", storage.port());
	let start = api
		.mock_async(|when, then| {
			when.method(GET).path("/v2/download").header("authorization", "Bearer access-1");
			then.status(302).header("location", blob_url.as_str());
		})
		.await;
	let blob = storage
		.mock_async(|when, then| {
			when.method(GET).path("/blob").header_missing("authorization");
			then.status(200).body("blob-bytes");
		})
		.await;
	let (client, _) =
		build_test_client(descriptor_for(&api.url("/v2/")), ClientConfig::default(), signed_in())
			.await;
	let outcome = client
		.execute(&get(&api.url("/v2/download")))
		.await
		.expect("Cross-host redirect should be followed without credentials.");

	assert_eq!(outcome.resource, b"blob-bytes");

	start.assert_calls_async(1).await;
	blob.assert_calls_async(1).await;
}

#[tokio::test]
async fn see_other_switches_to_get_without_body() {
	let server = MockServer::start_async().await;
	let upload = server
		.mock_async(|when, then| {
			when.method(POST).path("/v2/upload").body("payload");
			then.status(303).header("location", "/v2/status/1");
		})
		.await;
	let status = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/status/1");
			then.status(200).body("done");
		})
		.await;
	let (client, _) = build_test_client(
		descriptor_for(&server.url("/v2/")),
		ClientConfig::default(),
		signed_in(),
	)
	.await;
	let request = RequestDescriptor::builder(
		Method::POST,
		Url::parse(&server.url("/v2/upload")).expect("Upload URL should parse successfully."),
	)
	.body(|sink| {
		sink.extend_from_slice(b"payload");

		Ok(())
	})
	.bytes()
	.expect("Upload request should build successfully.");
	let outcome = client.execute(&request).await.expect("See-other chain should succeed.");

	assert_eq!(outcome.resource, b"done");

	upload.assert_calls_async(1).await;
	status.assert_calls_async(1).await;
}

#[tokio::test]
async fn redirect_loop_stops_at_the_configured_cap() {
	let server = MockServer::start_async().await;
	let looping = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/loop");
			then.status(302).header("location", "/v2/loop");
		})
		.await;
	let (client, _) = build_test_client(
		descriptor_for(&server.url("/v2/")),
		ClientConfig::default().with_max_redirects(2),
		signed_in(),
	)
	.await;
	let err = client
		.execute(&get(&server.url("/v2/loop")))
		.await
		.expect_err("Redirect loop should be cut off.");

	assert!(matches!(
		err.kind(),
		ErrorKind::Redirect(RedirectError::TooManyRedirects { hops: 2, .. })
	));

	looping.assert_calls_async(3).await;
}

#[tokio::test]
async fn redirect_without_location_is_rejected() {
	let server = MockServer::start_async().await;
	let moved = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/moved");
			then.status(301);
		})
		.await;
	let (client, _) = build_test_client(
		descriptor_for(&server.url("/v2/")),
		ClientConfig::default(),
		signed_in(),
	)
	.await;
	let err = client
		.execute(&get(&server.url("/v2/moved")))
		.await
		.expect_err("Redirect without Location should fail.");

	assert!(matches!(
		err.kind(),
		ErrorKind::Redirect(RedirectError::MissingLocation { status: 301, .. })
	));

	moved.assert_calls_async(1).await;
}

#[tokio::test]
async fn dropped_connections_are_retried_until_success() {
	let (base, accepted) = spawn_flaky_server(2).await;
	let (client, _) = build_test_client(
		descriptor_for(&base),
		ClientConfig::default().with_max_attempts(3),
		signed_in(),
	)
	.await;
	let outcome = client
		.execute(&get(&format!("{base}v2/files")))
		.await
		.expect("Third attempt should succeed.");

	assert_eq!(outcome.resource, b"ok");
	assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_report_the_attempt_count() {
	let (base, accepted) = spawn_flaky_server(u32::MAX).await;
	let (client, _) = build_test_client(
		descriptor_for(&base),
		ClientConfig::default().with_max_attempts(3),
		signed_in(),
	)
	.await;
	let err = client
		.execute(&get(&format!("{base}v2/files")))
		.await
		.expect_err("Every attempt should fail.");

	assert!(matches!(
		err.kind(),
		ErrorKind::Transport(TransportError::Exhausted { attempts: 3, .. })
	));
	assert!(err.to_string().contains("3 attempt(s)"));
	assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn http_error_statuses_are_not_retried() {
	let server = MockServer::start_async().await;
	let failing = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/files");
			then.status(503).body("maintenance");
		})
		.await;
	let (client, _) = build_test_client(
		descriptor_for(&server.url("/v2/")),
		ClientConfig::default().with_max_attempts(3),
		signed_in(),
	)
	.await;
	let err = client
		.execute(&get(&server.url("/v2/files")))
		.await
		.expect_err("A 503 should surface as a status error.");
	let status = err.as_http_status().expect("Error should carry the HTTP status.");

	assert_eq!(status.status, 503);
	assert_eq!(status.body, "maintenance");

	failing.assert_calls_async(1).await;
}

#[tokio::test]
async fn truncated_error_body_retries_the_exchange() {
	let (base, accepted) = spawn_raw_server(1, TRUNCATED_EXPIRY).await;
	let (client, _) = build_test_client(
		descriptor_for(&base),
		ClientConfig::default().with_max_attempts(3),
		signed_in(),
	)
	.await;
	let outcome = client
		.execute(&get(&format!("{base}v2/files")))
		.await
		.expect("A body cut short should be read again on a new connection.");

	assert_eq!(outcome.resource, b"ok");
	assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn truncated_error_body_on_every_attempt_is_not_reported_as_a_status() {
	let (base, accepted) = spawn_raw_server(u32::MAX, TRUNCATED_EXPIRY).await;
	let (client, _) = build_test_client(
		descriptor_for(&base),
		ClientConfig::default().with_max_attempts(2),
		signed_in(),
	)
	.await;
	let err = client
		.execute(&get(&format!("{base}v2/files")))
		.await
		.expect_err("Every truncated body should fail.");

	assert!(err.as_http_status().is_none());
	assert!(matches!(
		err.kind(),
		ErrorKind::Transport(TransportError::Exhausted { attempts: 2, .. })
	));
	assert_eq!(accepted.load(Ordering::SeqCst), 2);
}
