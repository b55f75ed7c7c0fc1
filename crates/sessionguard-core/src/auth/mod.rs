//! Authentication module for managing the user session and its credentials.
//!
//! This module provides:
//! - `TokenCodec`: access token payload decoding and expiry checks
//! - `CredentialStore`: best-effort persistence of the credential pair
//! - `SessionCoordinator`: the session state machine with single-flight refresh
//!
//! Access tokens are refreshed transparently once their `exp` claim passes.

pub mod codec;
pub mod credentials;
pub mod session;

pub use codec::{DecodedIdentity, TokenCodec};
pub use credentials::CredentialStore;
pub use session::{SessionCoordinator, SessionStatus};
