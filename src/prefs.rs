//! Local Preference Store
//!
//! Remembers the account list of the last wallet connection so the next
//! session can reconnect silently. The file store is a flat JSON object of
//! key → value, like browser local storage; only the `"accounts"` key is used.

use alloy_primitives::Address;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

/// Storage key of the remembered account list
pub const ACCOUNTS_KEY: &str = "accounts";

/// Persistent storage for the previously connected accounts
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Previously stored accounts; empty when nothing was stored or the
    /// stored value is unreadable
    async fn read_accounts(&self) -> Vec<Address>;

    /// Replace the stored accounts
    async fn write_accounts(&self, accounts: &[Address]) -> Result<(), PrefsError>;
}

/// Errors that can occur while persisting preferences
#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("IO error on {path:?}: {error}")]
    Io { path: PathBuf, error: std::io::Error },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// JSON file backed preference store
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: RwLock<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Default location under the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .map(|p| p.join("djed-dashboard").join("prefs.json"))
            .unwrap_or_else(|| PathBuf::from("./djed-dashboard-prefs.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, PrefsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(error) => Err(PrefsError::Io {
                path: self.path.clone(),
                error,
            }),
        }
    }

    async fn save(&self, entries: &Map<String, Value>) -> Result<(), PrefsError> {
        let io_err = |error| PrefsError::Io {
            path: self.path.clone(),
            error,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for FileStore {
    async fn read_accounts(&self) -> Vec<Address> {
        let _guard = self.lock.read().await;

        let entries = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Failed to read preferences");
                return Vec::new();
            }
        };

        match entries.get(ACCOUNTS_KEY) {
            None => Vec::new(),
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring malformed stored accounts");
                Vec::new()
            }),
        }
    }

    async fn write_accounts(&self, accounts: &[Address]) -> Result<(), PrefsError> {
        let _guard = self.lock.write().await;

        // Keep unrelated keys; a corrupt file is replaced
        let mut entries = self.load().await.unwrap_or_default();
        entries.insert(ACCOUNTS_KEY.to_string(), serde_json::to_value(accounts)?);
        self.save(&entries).await?;

        tracing::debug!(path = ?self.path, count = accounts.len(), "Stored accounts");
        Ok(())
    }
}

/// In-memory preference store
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<Vec<Address>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: Vec<Address>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn read_accounts(&self) -> Vec<Address> {
        self.accounts.read().await.clone()
    }

    async fn write_accounts(&self, accounts: &[Address]) -> Result<(), PrefsError> {
        *self.accounts.write().await = accounts.to_vec();
        Ok(())
    }
}
