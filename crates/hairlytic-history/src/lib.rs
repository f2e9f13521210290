#![warn(missing_docs)]
//! # hairlytic-history
//!
//! ## Purpose
//! Client-side view over the backend's prediction history.
//!
//! ## Responsibilities
//! - Persist the set of entries the user hid locally and filter fetched
//!   history through it ([`HistoryVisibilityStore`]).
//! - Track the detail view of one selected entry and the loading state of its
//!   image ([`HistoryDetail`]).
//!
//! ## Data flow
//! `GET /history` -> `Vec<HistoryEntry>` -> [`HistoryVisibilityStore::visible`]
//! -> history cards. Selecting a card -> [`HistoryDetail::open`] -> image
//! fetch -> [`HistoryDetail::image_loaded`] / [`HistoryDetail::image_failed`].
//!
//! ## Error model
//! Hiding never deletes anything remotely. A failed persist keeps the id
//! hidden in memory and reports [`HistoryError::Persist`].

use std::sync::Arc;

use hairlytic_media::ObjectUrl;
use hairlytic_prediction_contract::HistoryEntry;
use hairlytic_storage::{HIDDEN_IDS_KEY, LocalStorage, StorageError};
use thiserror::Error;
use tracing::{info, warn};

/// Text shown when no visible entries remain.
pub const EMPTY_HISTORY_TEXT: &str = "No historical data found in matrix.";

/// Locally persisted set of hidden history ids.
///
/// There is no unhide; ids only accumulate.
pub struct HistoryVisibilityStore {
    storage: Arc<dyn LocalStorage>,
    hidden: Vec<String>,
}

impl HistoryVisibilityStore {
    /// Loads the hidden set from storage. Unreadable data is treated as empty.
    pub fn load(storage: Arc<dyn LocalStorage>) -> Self {
        let hidden = storage
            .get(HIDDEN_IDS_KEY)
            .and_then(|raw| match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => Some(ids),
                Err(error) => {
                    warn!(stage = "history", action = "load_hidden", "ignoring unreadable hidden ids: {error}");
                    None
                }
            })
            .unwrap_or_default();

        let mut store = Self {
            storage,
            hidden: Vec::with_capacity(hidden.len()),
        };
        for id in hidden {
            if !store.hidden.contains(&id) {
                store.hidden.push(id);
            }
        }
        store
    }

    /// Hides `id` and persists the full set. Returns `false` when it was
    /// already hidden.
    ///
    /// # Errors
    /// Returns [`HistoryError::Persist`] when the set cannot be written; the id
    /// stays hidden for this process.
    pub fn hide(&mut self, id: &str) -> Result<bool, HistoryError> {
        if self.hidden.iter().any(|hidden| hidden == id) {
            return Ok(false);
        }
        self.hidden.push(id.to_string());
        info!(stage = "history", action = "hide", id, "entry hidden locally");

        let encoded = serde_json::to_string(&self.hidden)?;
        self.storage.set(HIDDEN_IDS_KEY, &encoded)?;
        Ok(true)
    }

    /// Returns `true` unless `id` was hidden.
    pub fn is_visible(&self, id: &str) -> bool {
        !self.hidden.iter().any(|hidden| hidden == id)
    }

    /// Filters `entries`, preserving backend order.
    pub fn visible<'a>(&self, entries: &'a [HistoryEntry]) -> Vec<&'a HistoryEntry> {
        entries
            .iter()
            .filter(|entry| self.is_visible(&entry.id))
            .collect()
    }

    /// Hidden ids in insertion order.
    pub fn hidden_ids(&self) -> &[String] {
        &self.hidden
    }
}

/// Loading state of the detail-view image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryImageState {
    /// Fetch in flight.
    Loading,
    /// Image available under this URL.
    Ready(ObjectUrl),
    /// Fetch failed; shown inline in the detail view.
    Failed(HistoryImageFetchError),
}

/// Detail view of one selected history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDetail {
    entry: HistoryEntry,
    image: HistoryImageState,
}

impl HistoryDetail {
    /// Opens the detail view in the loading state.
    pub fn open(entry: HistoryEntry) -> Self {
        Self {
            entry,
            image: HistoryImageState::Loading,
        }
    }

    /// Selected entry.
    pub fn entry(&self) -> &HistoryEntry {
        &self.entry
    }

    /// Image state.
    pub fn image(&self) -> &HistoryImageState {
        &self.image
    }

    /// Records a loaded image.
    pub fn image_loaded(&mut self, url: ObjectUrl) {
        self.image = HistoryImageState::Ready(url);
    }

    /// Records a failed image fetch.
    pub fn image_failed(&mut self, error: HistoryImageFetchError) {
        self.image = HistoryImageState::Failed(error);
    }
}

/// Resolves which user's upload folder holds the entry image.
pub fn image_owner<'a>(entry: &'a HistoryEntry, session_username: &'a str) -> &'a str {
    entry
        .username
        .as_deref()
        .filter(|owner| !owner.trim().is_empty())
        .unwrap_or(session_username)
}

/// Failure to show a history entry's image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryImageFetchError {
    /// The record has no stored image.
    #[error("Image reference missing for this prediction")]
    MissingReference,
    /// The backend did not return the image.
    #[error("Unable to retrieve image from server")]
    Unavailable,
}

impl HistoryImageFetchError {
    /// Short placeholder label for the image frame.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingReference => "Incomplete Fragment",
            Self::Unavailable => "Asset Missing",
        }
    }
}

/// History load failure. Logged, never shown as an alert.
#[derive(Debug, Error)]
#[error("history load failed: {0}")]
pub struct HistoryLoadError(pub String);

/// Visibility store errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Hidden ids could not be encoded.
    #[error("hidden ids encode failure: {0}")]
    Encode(#[from] serde_json::Error),
    /// Hidden ids could not be written.
    #[error("hidden ids persist failure: {0}")]
    Persist(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for local hiding.

    use hairlytic_prediction_contract::PredictionStatus;
    use hairlytic_storage::{FileStorage, MemoryStorage};

    use super::*;

    fn entry(id: &str) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            filename: format!("{id}.jpg"),
            image_filename: Some(format!("{id}_stored.jpg")),
            username: None,
            timestamp: "2026-10-16T14:05:00".to_string(),
            status: PredictionStatus::Accepted,
            diagnosis: Some("Alopecia Detected".to_string()),
            message: None,
            detections: None,
        }
    }

    #[test]
    fn hiding_twice_matches_hiding_once() {
        let entries = vec![entry("a"), entry("b"), entry("c")];
        let mut once = HistoryVisibilityStore::load(Arc::new(MemoryStorage::new()));
        let mut twice = HistoryVisibilityStore::load(Arc::new(MemoryStorage::new()));

        assert!(once.hide("b").expect("hide should persist"));
        assert!(twice.hide("b").expect("hide should persist"));
        assert!(!twice.hide("b").expect("hide should persist"));

        let ids = |store: &HistoryVisibilityStore| -> Vec<String> {
            store.visible(&entries).iter().map(|entry| entry.id.clone()).collect()
        };
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(ids(&once), vec!["a".to_string(), "c".to_string()]);
        assert_eq!(twice.hidden_ids(), ["b".to_string()]);
    }

    #[test]
    fn hidden_ids_survive_reload() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("storage.json");

        let storage = Arc::new(FileStorage::open(&path).expect("storage should open"));
        let mut store = HistoryVisibilityStore::load(storage);
        store.hide("entry-1").expect("hide should persist");
        drop(store);

        let reloaded = HistoryVisibilityStore::load(Arc::new(
            FileStorage::open(&path).expect("storage should reopen"),
        ));
        assert!(!reloaded.is_visible("entry-1"));
        assert!(reloaded.is_visible("entry-2"));
    }

    #[test]
    fn image_owner_falls_back_to_session_user() {
        let mut record = entry("a");
        assert_eq!(image_owner(&record, "alice"), "alice");
        record.username = Some("bob".to_string());
        assert_eq!(image_owner(&record, "alice"), "bob");
    }
}
