//! Requests parked until the user signs in again.

// self
use crate::{_prelude::*, client::Client, page::RequestOutcome, request::RequestDescriptor};

/// A request captured when it failed for lack of a usable sign-in.
///
/// Keep it while the application runs its sign-in UI, then call [`resume`](Self::resume).
#[derive(Clone, Debug)]
pub struct PendingRequest<T> {
	request: RequestDescriptor<T>,
}
impl<T> PendingRequest<T> {
	/// Wraps `request` unconditionally.
	pub fn new(request: RequestDescriptor<T>) -> Self {
		Self { request }
	}

	/// Captures `request` when `error` says the user must sign in before it can succeed.
	pub fn after_failure(request: &RequestDescriptor<T>, error: &Error) -> Option<Self> {
		error.requires_sign_in().then(|| Self::new(request.clone()))
	}

	/// The parked request.
	pub fn request(&self) -> &RequestDescriptor<T> {
		&self.request
	}

	/// Re-issues the parked request through `client`.
	pub async fn resume(self, client: &Client) -> Result<RequestOutcome<T>> {
		client.execute(&self.request).await
	}
}
