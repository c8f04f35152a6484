// crates.io
use httpmock::prelude::*;
// self
use oauth2_request_core::{
	_preludet::*,
	config::ClientConfig,
	error::{AuthError, ConfigError},
	provider::{ApiDescriptor, ClientAuthMethod},
};

fn build_descriptor(server: &MockServer, auth_method: ClientAuthMethod) -> ApiDescriptor {
	ApiDescriptor::builder(
		Url::parse(&server.url("/v2/")).expect("Mock API base should parse successfully."),
	)
	.authorization_endpoint(
		Url::parse(&server.url("/authorize"))
			.expect("Mock authorize endpoint should parse successfully."),
	)
	.token_endpoint(
		Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully."),
	)
	.default_scopes(["files.read", "files.write"])
	.client_auth_method(auth_method)
	.build()
	.expect("API descriptor should build successfully.")
}

#[tokio::test]
async fn password_grant_stores_a_complete_credential_set() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=password")
				.body_includes("username=alice")
				.body_includes("password=hunter2")
				.body_includes("client_id=client-test")
				.body_includes("client_secret=secret-test");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-pw\",\"refresh_token\":\"refresh-pw\",\"token_type\":\"bearer\",\"expires_in\":1800}",
			);
		})
		.await;
	let (client, store) = build_test_client(
		build_descriptor(&server, ClientAuthMethod::ClientSecretPost),
		ClientConfig::default(),
		None,
	)
	.await;

	assert!(!client.is_signed_in().await.expect("Store should be readable."));

	let credentials = client
		.sign_in_with_password("alice", "hunter2")
		.await
		.expect("Password sign-in should succeed.");

	token.assert_calls_async(1).await;

	assert_eq!(credentials.access_token().map(|t| t.expose()), Some("access-pw"));
	assert_eq!(store.snapshot(), credentials);
	assert!(client.is_signed_in().await.expect("Store should be readable."));

	client.sign_out().await.expect("Sign-out should succeed.");

	assert!(!client.is_signed_in().await.expect("Store should be readable."));
	assert!(!store.snapshot().has_access_token());
}

#[tokio::test]
async fn authorization_code_exchange_sends_the_pkce_verifier() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header_exists("authorization")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=code-123")
				.body_includes("code_verifier=");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-code\",\"refresh_token\":\"refresh-code\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let (client, store) = build_test_client(
		build_descriptor(&server, ClientAuthMethod::ClientSecretBasic),
		ClientConfig::default(),
		None,
	)
	.await;
	let session = client.start_authorization().expect("Authorization session should start.");
	let pairs: HashMap<_, _> = session.authorize_url.query_pairs().into_owned().collect();

	assert!(session.authorize_url.as_str().starts_with(&server.url("/authorize")));
	assert_eq!(pairs.get("scope").map(String::as_str), Some("files.read files.write"));
	assert_eq!(
		pairs.get("redirect_uri").map(String::as_str),
		Some("https://app.example.com/callback")
	);

	let state = session.state.clone();
	let credentials = client
		.complete_authorization(session, &state, "code-123")
		.await
		.expect("Authorization code exchange should succeed.");

	token.assert_calls_async(1).await;

	assert_eq!(credentials.refresh_token().map(|t| t.expose()), Some("refresh-code"));
	assert_eq!(store.snapshot(), credentials);
}

#[tokio::test]
async fn mismatched_state_never_reaches_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500);
		})
		.await;
	let (client, _) = build_test_client(
		build_descriptor(&server, ClientAuthMethod::ClientSecretBasic),
		ClientConfig::default(),
		None,
	)
	.await;
	let session = client.start_authorization().expect("Authorization session should start.");
	let err = client
		.complete_authorization(session, "forged-state", "code-123")
		.await
		.expect_err("State mismatch should be rejected.");

	assert!(matches!(err.kind(), ErrorKind::Auth(AuthError::StateMismatch)));
	assert!(err.requires_sign_in());

	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn token_response_without_expiry_is_rejected() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-x\",\"token_type\":\"bearer\"}");
		})
		.await;
	let (client, store) = build_test_client(
		build_descriptor(&server, ClientAuthMethod::ClientSecretBasic),
		ClientConfig::default(),
		None,
	)
	.await;
	let err = client
		.sign_in_with_password("alice", "hunter2")
		.await
		.expect_err("A grant without expires_in should be rejected.");

	assert!(matches!(err.kind(), ErrorKind::Auth(AuthError::MissingExpiresIn)));
	assert!(!store.snapshot().has_access_token());

	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn authorization_requires_an_authorization_endpoint() {
	let server = MockServer::start_async().await;
	let descriptor = ApiDescriptor::builder(
		Url::parse(&server.url("/v2/")).expect("Mock API base should parse successfully."),
	)
	.token_endpoint(
		Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully."),
	)
	.build()
	.expect("API descriptor should build successfully.");
	let (client, _) = build_test_client(descriptor, ClientConfig::default(), None).await;
	let err = client.start_authorization().expect_err("Authorization should need an endpoint.");

	assert!(matches!(err.kind(), ErrorKind::Config(ConfigError::MissingAuthorizationEndpoint)));
}

#[tokio::test]
async fn forced_refresh_keeps_the_previous_refresh_token() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("refresh_token=refresh-1");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-2\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let (client, store) = build_test_client(
		build_descriptor(&server, ClientAuthMethod::ClientSecretPost),
		ClientConfig::default(),
		Some(credentials_valid_for("access-1", "refresh-1", Duration::hours(1))),
	)
	.await;
	let refreshed = client.refresh_now().await?;

	assert_eq!(refreshed.access_token().map(|t| t.expose()), Some("access-2"));
	assert_eq!(refreshed.refresh_token().map(|t| t.expose()), Some("refresh-1"));
	assert_eq!(store.snapshot(), refreshed);

	token.assert_calls_async(1).await;

	Ok(())
}
