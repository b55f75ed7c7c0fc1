use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::CredentialPair;
use crate::storage::KeyValueStore;

/// Default key prefix; the version segment changes if the layout ever does.
pub const DEFAULT_KEY_PREFIX: &str = "sessionguard.v1";

/// Durable persistence of the current credential pair.
///
/// Persistence is best-effort: backend failures are logged and swallowed, so
/// an unavailable medium degrades the session to in-memory only.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
    access_key: String,
    refresh_key: String,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(backend, DEFAULT_KEY_PREFIX)
    }

    /// Store whose two slots live under `<prefix>.access_token` and
    /// `<prefix>.refresh_token`
    pub fn with_prefix(backend: Arc<dyn KeyValueStore>, prefix: &str) -> Self {
        Self {
            backend,
            access_key: format!("{prefix}.access_token"),
            refresh_key: format!("{prefix}.refresh_token"),
        }
    }

    /// Load the persisted pair.
    ///
    /// A half-written pair (one slot missing or empty) is treated as no
    /// session at all.
    pub fn load(&self) -> Option<CredentialPair> {
        let access_token = self.read(&self.access_key)?;
        let refresh_token = self.read(&self.refresh_key)?;
        Some(CredentialPair {
            access_token,
            refresh_token,
        })
    }

    /// Persist `pair`, or clear both slots when it is absent or incomplete.
    pub fn save(&self, pair: Option<&CredentialPair>) {
        match pair {
            Some(pair) if pair.is_complete() => {
                self.write(&self.access_key, &pair.access_token);
                self.write(&self.refresh_key, &pair.refresh_token);
                debug!("Credentials persisted");
            }
            _ => self.clear(),
        }
    }

    /// Remove both slots
    pub fn clear(&self) {
        for key in [&self.access_key, &self.refresh_key] {
            if let Err(e) = self.backend.remove(key) {
                warn!(error = %e, key = %key, "Failed to clear stored credential");
            }
        }
        debug!("Credentials cleared");
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, key = %key, "Failed to read stored credential");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            warn!(error = %e, key = %key, "Failed to store credential");
        }
    }
}
