//! API-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata ([`ApiDescriptor`]) covering the API base whose host
//! decides whether a bearer token may follow a redirect, HTTPS-only OAuth endpoints, and client
//! authentication preferences. `strategy` defines [`ApiStrategy`], an HTTP-client-agnostic hook
//! that classifies token endpoint failures and recognizes expired-token responses.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
