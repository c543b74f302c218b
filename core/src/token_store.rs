//! Persistence of the single authentication token.
//!
//! # Design
//! `TokenStore` owns a `KeyValueStore` behind a mutex, so concurrent
//! `save`/`get`/`clear` calls never observe a torn value. Two stores ship
//! with the crate: `MemoryStore` for tests and ephemeral sessions, and
//! `FileStore`, which keeps one JSON document per namespace and replaces it
//! atomically (write to a sibling temp file, then rename).

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::StorageError;

/// Namespace the token is stored under.
pub const DEFAULT_NAMESPACE: &str = "shop_sdk_prefs";

/// Key of the token inside the namespace.
pub const TOKEN_KEY: &str = "auth_token";

/// Minimal string key-value storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Non-persistent store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by `<dir>/<namespace>.json`.
///
/// The file is read once on open and rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open (or lazily create) the namespace file inside `dir`.
    pub fn open(dir: &Path, namespace: &str) -> Result<Self, StorageError> {
        let path = dir.join(format!("{namespace}.json"));
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        debug!(path = %path.display(), keys = entries.len(), "opened token storage");
        Ok(Self { path, entries })
    }

    /// Open the namespace inside the platform data directory.
    pub fn open_default(namespace: &str) -> Result<Self, StorageError> {
        let dir = dirs::data_dir().ok_or(StorageError::NoDataDir)?.join("shop-sdk");
        Self::open(&dir, namespace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let raw = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        self.entries = next;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut next = self.entries.clone();
        next.remove(key);
        self.flush(&next)?;
        self.entries = next;
        Ok(())
    }
}

/// Holds zero or one authentication token.
pub struct TokenStore {
    store: Mutex<Box<dyn KeyValueStore>>,
}

impl TokenStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Persist `token`, replacing any previous one.
    pub fn save(&self, token: &str) -> Result<(), StorageError> {
        self.store.lock().set(TOKEN_KEY, token)
    }

    pub fn get(&self) -> Option<String> {
        self.store.lock().get(TOKEN_KEY)
    }

    /// Remove the token. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.lock().remove(TOKEN_KEY)
    }

    /// Whether a token is stored. Never contacts the server and says nothing
    /// about whether the token is still valid.
    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    /// Clear, logging instead of failing. Used where local sign-out must win.
    pub(crate) fn clear_best_effort(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "failed to clear stored token");
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
