//! Settings for the `sessionguard` front end.
//!
//! Two layers: [`Config`] is what the user edits on disk (service URL,
//! credential backend, timing), and [`SessionOptions`] is the checked form
//! a [`SessionCoordinator`](crate::SessionCoordinator) is built from.
//! Missing fields in the file fall back to their defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::client::REQUEST_TIMEOUT_SECS;
use crate::error::SessionError;
use crate::storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore};

/// Directory name under the platform config and cache roots
pub const APP_NAME: &str = "sessionguard";

const CONFIG_FILE: &str = "config.json";

/// Backend that holds the persisted credential pair.
///
/// `file` writes `session.json` under the cache directory and works on any
/// host. `keyring` needs a platform credential service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Keyring,
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root URL of the authentication service; endpoint paths join onto it
    pub base_url: Option<String>,
    pub storage: StorageKind,
    /// Seconds before `exp` at which a token already counts as stale
    pub refresh_skew_secs: i64,
    /// Upper bound on each call to the service
    pub request_timeout_secs: u64,
    /// Offered as the default at the next login prompt
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            storage: StorageKind::default(),
            refresh_skew_secs: 0,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            last_email: None,
        }
    }
}

impl Config {
    /// Read `config.json`, or defaults when it has not been written yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        let root = dirs::config_dir().context("no config directory on this platform")?;
        Ok(root.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed credential store
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let root = dirs::cache_dir().context("no cache directory on this platform")?;
        Ok(root.join(APP_NAME))
    }

    /// Open the configured credential backend.
    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>> {
        self.open_store_at(&self.cache_dir()?)
    }

    /// Same as [`Config::open_store`] with the file backend rooted at `dir`.
    pub fn open_store_at(&self, dir: &Path) -> Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match self.storage {
            StorageKind::Keyring => Arc::new(KeyringStore::default()),
            StorageKind::File => Arc::new(FileStore::in_dir(dir)),
            StorageKind::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }
}

/// Validated settings for one session coordinator.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub base_url: Url,
    pub refresh_skew_secs: i64,
    pub request_timeout: Duration,
}

impl SessionOptions {
    pub fn new(base_url: &str) -> Result<Self, SessionError> {
        let url = Url::parse(base_url)
            .map_err(|e| SessionError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(SessionError::InvalidBaseUrl(format!(
                "{base_url}: expected an http(s) URL"
            )));
        }
        Ok(Self {
            base_url: url,
            refresh_skew_secs: 0,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| SessionError::InvalidBaseUrl("base URL is not configured".to_string()))?;
        Ok(Self::new(base_url)?
            .with_refresh_skew(config.refresh_skew_secs)
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs)))
    }

    pub fn with_refresh_skew(mut self, secs: i64) -> Self {
        self.refresh_skew_secs = secs;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
