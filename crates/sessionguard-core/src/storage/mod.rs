//! Durable key-value backends for credential persistence.
//!
//! The credential store only needs three operations on a string-keyed medium,
//! captured by [`KeyValueStore`]. Backends:
//! - `MemoryStore`: process-local, for tests and ephemeral sessions
//! - `FileStore`: a JSON file in the cache directory
//! - `KeyringStore`: the OS keychain

pub mod file;
pub mod keyring;
pub mod memory;

use thiserror::Error;

pub use self::file::FileStore;
pub use self::keyring::KeyringStore;
pub use self::memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] ::keyring::Error),

    #[error("Storage file is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A durable string-keyed medium.
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key is not set
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
