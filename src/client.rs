//! The authorized request client.
//!
//! [`Client`] owns the credential store, client credentials, transport, and token endpoint for
//! one account. Each [`Client::execute`] call makes sure a token is present, refreshes it ahead
//! of expiry, runs the exchange, and recovers once from a server-reported expired token.

mod pending;
mod refresh;
mod sign_in;

pub use pending::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, Credentials},
	config::{ClientConfig, ClientHooks},
	error::ConfigError,
	http,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	oauth::{BasicTokenEndpoint, TokenEndpoint},
	page::RequestOutcome,
	provider::{ApiDescriptor, ApiStrategy, DefaultApiStrategy},
	request::RequestDescriptor,
	store::{CredentialStore, MemoryStore},
	transport::{CancellationRegistry, CancellationToken, Transport},
};

/// Authorized request executor for a single account.
///
/// Clones share the store, refresh guard, metrics, and cancellation registry, so concurrent
/// callers holding clones still coalesce their refreshes.
#[derive(Clone)]
pub struct Client {
	store: Arc<dyn CredentialStore>,
	client_credentials: ClientCredentials,
	descriptor: ApiDescriptor,
	transport: Transport,
	token_endpoint: Arc<dyn TokenEndpoint>,
	strategy: Arc<dyn ApiStrategy>,
	config: ClientConfig,
	hooks: ClientHooks,
	refresh_metrics: Arc<RefreshMetrics>,
	refresh_guard: Arc<AsyncMutex<()>>,
	cancellations: Arc<CancellationRegistry>,
}
impl Client {
	/// Starts building a client for `descriptor` using the registered client credentials.
	pub fn builder(
		descriptor: ApiDescriptor,
		client_credentials: ClientCredentials,
	) -> ClientBuilder {
		ClientBuilder::new(descriptor, client_credentials)
	}

	/// API descriptor the client was built with.
	pub fn descriptor(&self) -> &ApiDescriptor {
		&self.descriptor
	}

	/// Registered client credentials.
	pub fn client_credentials(&self) -> &ClientCredentials {
		&self.client_credentials
	}

	/// Tunables the client was built with.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Refresh counters shared by every clone of this client.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Returns the stored credential set.
	pub async fn credentials(&self) -> Result<Credentials> {
		Ok(self.store.get().await?)
	}

	/// Executes `request` with the stored bearer token.
	///
	/// # Errors
	///
	/// - [`ErrorKind::NotSignedIn`] without any network call when no access token is stored.
	/// - [`ErrorKind::Auth`] when a proactive or reactive refresh fails.
	/// - [`ErrorKind::HttpStatus`] for unexpected statuses, including a second expired-token
	///   rejection after the single reactive refresh.
	/// - [`ErrorKind::Transport`] once every connection attempt failed.
	pub async fn execute<T>(&self, request: &RequestDescriptor<T>) -> Result<RequestOutcome<T>> {
		observed(OperationKind::Request, "execute", self.execute_authorized(request)).await
	}

	/// Returns the cancellation token registered under `id`, creating it when absent.
	///
	/// Attach it with [`RequestDescriptor::with_cancellation`]. The registration lapses once every
	/// clone of the token is dropped; [`release_cancellation`](Self::release_cancellation) forgets
	/// it right away.
	pub fn cancellation_token(&self, id: impl Into<String>) -> CancellationToken {
		self.cancellations.register(id)
	}

	/// Cancels the transfer registered under `id`; returns `false` when none is registered.
	pub fn cancel(&self, id: &str) -> bool {
		self.cancellations.cancel(id)
	}

	/// Forgets the cancellation token registered under `id`.
	pub fn release_cancellation(&self, id: &str) {
		self.cancellations.release(id);
	}

	async fn execute_authorized<T>(
		&self,
		request: &RequestDescriptor<T>,
	) -> Result<RequestOutcome<T>> {
		let mut credentials = self.store.get().await?;

		if !credentials.has_access_token() {
			return Err(ErrorKind::NotSignedIn.into());
		}
		if credentials.will_expire_soon(OffsetDateTime::now_utc(), self.config.min_token_validity) {
			credentials = self.refresh(RefreshTrigger::Proactive).await?;
		}

		let access_token = credentials.access_token().cloned().ok_or(ErrorKind::NotSignedIn)?;

		match self.transport.execute(request, Some(&access_token)).await {
			Err(err) if self.is_expired_token(&err) => {
				let refreshed =
					self.refresh(RefreshTrigger::Reactive { rejected: &access_token }).await?;
				let access_token =
					refreshed.access_token().cloned().ok_or(ErrorKind::NotSignedIn)?;

				self.transport.execute(request, Some(&access_token)).await
			},
			result => result,
		}
	}

	fn is_expired_token(&self, err: &Error) -> bool {
		err.as_http_status().is_some_and(|status| self.strategy.is_expired_token(status))
	}
}
impl Debug for Client {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("descriptor", &self.descriptor)
			.field("client_credentials", &self.client_credentials)
			.field("config", &self.config)
			.field("hooks", &self.hooks)
			.finish_non_exhaustive()
	}
}

/// Builder for [`Client`] values.
pub struct ClientBuilder {
	descriptor: ApiDescriptor,
	client_credentials: ClientCredentials,
	store: Option<Arc<dyn CredentialStore>>,
	config: ClientConfig,
	hooks: ClientHooks,
	http_client: Option<ReqwestClient>,
	strategy: Option<Arc<dyn ApiStrategy>>,
	token_endpoint: Option<Arc<dyn TokenEndpoint>>,
}
impl ClientBuilder {
	fn new(descriptor: ApiDescriptor, client_credentials: ClientCredentials) -> Self {
		Self {
			descriptor,
			client_credentials,
			store: None,
			config: ClientConfig::default(),
			hooks: ClientHooks::default(),
			http_client: None,
			strategy: None,
			token_endpoint: None,
		}
	}

	/// Uses `store` for credentials (defaults to an empty [`MemoryStore`]).
	pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Overrides the tunables.
	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = config;

		self
	}

	/// Registers lifecycle hooks.
	pub fn hooks(mut self, hooks: ClientHooks) -> Self {
		self.hooks = hooks;

		self
	}

	/// Supplies a preconfigured reqwest client.
	///
	/// The client must not follow redirects on its own, otherwise bearer tokens could reach
	/// foreign hosts. Timeouts and the user agent from [`ClientConfig`] are not applied to it.
	pub fn http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Overrides the API strategy (defaults to [`DefaultApiStrategy`]).
	pub fn strategy(mut self, strategy: Arc<dyn ApiStrategy>) -> Self {
		self.strategy = Some(strategy);

		self
	}

	/// Overrides the token endpoint (defaults to [`BasicTokenEndpoint`]).
	pub fn token_endpoint(mut self, endpoint: Arc<dyn TokenEndpoint>) -> Self {
		self.token_endpoint = Some(endpoint);

		self
	}

	/// Builds the client.
	pub fn build(self) -> Result<Client, ConfigError> {
		let http_client = match self.http_client {
			Some(client) => client,
			None => http::build_http_client(&self.config)?,
		};
		let token_endpoint: Arc<dyn TokenEndpoint> = match self.token_endpoint {
			Some(endpoint) => endpoint,
			None => Arc::new(BasicTokenEndpoint::new(
				&self.descriptor,
				&self.client_credentials,
				http_client.clone(),
			)?),
		};
		let transport = Transport::new(http_client, &self.descriptor, &self.config);

		Ok(Client {
			store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::default())),
			client_credentials: self.client_credentials,
			descriptor: self.descriptor,
			transport,
			token_endpoint,
			strategy: self.strategy.unwrap_or_else(|| Arc::new(DefaultApiStrategy)),
			config: self.config,
			hooks: self.hooks,
			refresh_metrics: Default::default(),
			refresh_guard: Default::default(),
			cancellations: Default::default(),
		})
	}
}

async fn observed<F, T>(kind: OperationKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = OperationSpan::new(kind, stage);

	obs::record_operation_outcome(kind, OperationOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => obs::record_operation_outcome(kind, OperationOutcome::Success),
		Err(_) => obs::record_operation_outcome(kind, OperationOutcome::Failure),
	}

	result
}
