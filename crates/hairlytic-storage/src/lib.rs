#![warn(missing_docs)]
//! # hairlytic-storage
//!
//! ## Purpose
//! Durable client-side key/value storage for state that must survive a
//! restart: the session pair and the hidden history ids.
//!
//! ## Responsibilities
//! - Define the [`LocalStorage`] seam used by the session and history crates.
//! - Provide a JSON-file implementation ([`FileStorage`]) that writes through
//!   on every mutation.
//! - Provide an in-memory implementation ([`MemoryStorage`]) for tests.
//!
//! ## Error model
//! I/O and encoding failures surface as [`StorageError`]. A corrupt file on
//! open is logged and treated as empty rather than blocking startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;
use tracing::warn;

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "access_token";
/// Storage key for the username paired with the token.
pub const USERNAME_KEY: &str = "username";
/// Storage key for the JSON array of locally hidden history ids.
pub const HIDDEN_IDS_KEY: &str = "deleted_history_ids";

/// String key/value store with write-through durability.
pub trait LocalStorage: Send + Sync {
    /// Returns the stored value for `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is a no-op.
    ///
    /// # Errors
    /// Returns [`StorageError`] when the removal cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// JSON-file backed storage.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens (or lazily creates) storage at `path`.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] when an existing file cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents).unwrap_or_else(|error| {
                warn!(
                    stage = "storage",
                    action = "open",
                    path = %path.display(),
                    "discarding unreadable storage file: {error}"
                );
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Default location under the platform data directory.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("hairlytic");
        path.push("local-storage.json");
        path
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `data` to disk. Callers commit to memory only after this
    /// succeeds, so memory never runs ahead of the file.
    fn persist(&self, data: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, encoded)?;
        Ok(())
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.data.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|_| StorageError::Poisoned)?;
        let mut next = data.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *data = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().map_err(|_| StorageError::Poisoned)?;
        if !data.contains_key(key) {
            return Ok(());
        }
        let mut next = data.clone();
        next.remove(key);
        self.persist(&next)?;
        *data = next;
        Ok(())
    }
}

/// Volatile storage for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.data.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.data
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
    /// Encoding failure.
    #[error("storage encode failure: {0}")]
    Encode(#[from] serde_json::Error),
    /// A writer panicked while holding the lock.
    #[error("storage lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    //! Unit tests for file persistence.

    use super::*;

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("nested").join("store.json");

        let storage = FileStorage::open(&path).expect("storage should open");
        storage.set(TOKEN_KEY, "abc").expect("set should persist");
        storage.set(USERNAME_KEY, "alice").expect("set should persist");
        storage.remove(TOKEN_KEY).expect("remove should persist");
        drop(storage);

        let reopened = FileStorage::open(&path).expect("storage should reopen");
        assert_eq!(reopened.get(TOKEN_KEY), None);
        assert_eq!(reopened.get(USERNAME_KEY).as_deref(), Some("alice"));
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").expect("fixture should be written");

        let storage = FileStorage::open(&path).expect("corrupt storage should still open");
        assert_eq!(storage.get(HIDDEN_IDS_KEY), None);
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let parent = dir.path().join("profile");
        let storage = FileStorage::open(parent.join("store.json")).expect("storage should open");
        storage.set(USERNAME_KEY, "alice").expect("set should persist");

        fs::remove_dir_all(&parent).expect("parent should be removed");
        fs::write(&parent, "not a directory").expect("blocker should be written");

        assert!(storage.set(USERNAME_KEY, "mallory").is_err());
        assert!(storage.set(TOKEN_KEY, "abc").is_err());
        assert!(storage.remove(USERNAME_KEY).is_err());
        assert_eq!(storage.get(USERNAME_KEY).as_deref(), Some("alice"));
        assert_eq!(storage.get(TOKEN_KEY), None);
    }
}
