//! Credential models: the stored token set, client credentials, and sign-in sessions.

pub mod credentials;
pub mod secret;
pub mod session;

pub use credentials::*;
pub use secret::*;
pub use session::*;
