//! HTTP transport module for the authentication service.
//!
//! This module provides the `Transport` capability the session coordinator
//! depends on, the reqwest-backed `ApiClient` implementing it, and the table
//! of remote endpoints.
//!
//! Transport failures are reported as `ApiError` and passed through to
//! callers unchanged.

pub mod client;
pub mod endpoint;
pub mod error;

pub use client::{ApiClient, Transport};
pub use endpoint::Endpoint;
pub use error::ApiError;
