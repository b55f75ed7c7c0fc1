//! sessionguard core library.
//!
//! Client-side session management for token-based authentication: keeps the
//! current identity and credential pair, refreshes expired access tokens
//! with at most one refresh call in flight, and persists credentials across
//! restarts.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sessionguard_core::{
//!     ApiClient, CredentialStore, LoginRequest, MemoryStore, SessionCoordinator, SessionOptions,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let options = SessionOptions::new("https://auth.example.com")?;
//! let transport = Arc::new(ApiClient::new()?);
//! let store = CredentialStore::new(Arc::new(MemoryStore::new()));
//! let session = SessionCoordinator::init(options, transport, store).await;
//!
//! session
//!     .login(&LoginRequest {
//!         email: "user@example.com".to_string(),
//!         password: "secret".to_string(),
//!     })
//!     .await?;
//! let bearer = session.get_valid_token().await?;
//! # let _ = bearer;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, Endpoint, Transport};
pub use auth::{CredentialStore, DecodedIdentity, SessionCoordinator, SessionStatus, TokenCodec};
pub use config::{Config, SessionOptions, StorageKind};
pub use error::SessionError;
pub use models::{
    ChangePasswordRequest, CredentialPair, ForgotPasswordRequest, LoginRequest, MessageResponse,
    RegisterRequest, ResetPasswordRequest,
};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StorageError};
