#![warn(missing_docs)]
//! # hairlytic-media
//!
//! ## Purpose
//! Owns locally created displayable URLs for image previews and guarantees
//! each one is released exactly once.
//!
//! ## Responsibilities
//! - Mint `blob:` URLs that resolve to in-memory image data.
//! - Keep at most one live URL per [`MediaSlot`].
//! - Release the superseded URL as part of installing its replacement.
//! - Release everything on teardown ([`Drop`]).
//!
//! ## Data flow
//! File selection / snapshot -> [`ObjectUrlManager::set`] -> [`MediaReference`]
//! rendered by the UI -> [`ObjectUrlManager::clear`] when replaced, closed, or
//! discarded.
//!
//! ## Ownership and lifetimes
//! The manager is the only owner of the URL table. Callers hold
//! [`ObjectUrl`] values as opaque keys; resolving a released key yields
//! `None`, so stale handles cannot reach released data.
//!
//! ## Error model
//! Infallible. Clearing an empty slot is a no-op.

use std::collections::HashMap;
use std::fmt;

use hairlytic_core::ImageFile;
use tracing::debug;

const URL_PREFIX: &str = "blob:hairlytic/";

/// Logical display slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSlot {
    /// Image selected or captured for the next submission.
    Preview,
    /// Image shown in the history detail view.
    HistoryImage,
}

/// Locally scoped displayable URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    /// Returns the URL text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image paired with its live display URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    /// Underlying image data.
    pub image: ImageFile,
    /// URL under which the image is displayable.
    pub url: ObjectUrl,
}

/// Lifetime counters, used to audit install/release pairing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlStats {
    /// URLs minted so far.
    pub created: u64,
    /// URLs released so far.
    pub revoked: u64,
}

impl UrlStats {
    /// URLs currently live.
    pub fn live(&self) -> u64 {
        self.created - self.revoked
    }
}

/// Slot-keyed owner of displayable URLs.
#[derive(Debug, Default)]
pub struct ObjectUrlManager {
    next_id: u64,
    slots: HashMap<MediaSlot, ObjectUrl>,
    blobs: HashMap<ObjectUrl, ImageFile>,
    stats: UrlStats,
}

impl ObjectUrlManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `image` in `slot`, releasing the slot's previous URL.
    pub fn set(&mut self, slot: MediaSlot, image: ImageFile) -> MediaReference {
        let url = self.create(image.clone());
        if let Some(previous) = self.slots.insert(slot, url.clone()) {
            self.revoke(&previous);
        }
        debug!(stage = "media", action = "set", ?slot, url = url.as_str(), "installed object url");
        MediaReference { image, url }
    }

    /// Releases the URL in `slot`. Returns `false` when the slot was empty.
    pub fn clear(&mut self, slot: MediaSlot) -> bool {
        match self.slots.remove(&slot) {
            Some(url) => {
                self.revoke(&url);
                debug!(stage = "media", action = "clear", ?slot, url = url.as_str(), "released object url");
                true
            }
            None => false,
        }
    }

    /// Releases every slot.
    pub fn clear_all(&mut self) {
        for slot in [MediaSlot::Preview, MediaSlot::HistoryImage] {
            self.clear(slot);
        }
    }

    /// Returns the live reference in `slot`.
    pub fn current(&self, slot: MediaSlot) -> Option<MediaReference> {
        let url = self.slots.get(&slot)?;
        let image = self.blobs.get(url)?;
        Some(MediaReference {
            image: image.clone(),
            url: url.clone(),
        })
    }

    /// Resolves a URL to its data. Released URLs resolve to `None`.
    pub fn resolve(&self, url: &ObjectUrl) -> Option<&ImageFile> {
        self.blobs.get(url)
    }

    /// Returns install/release counters.
    pub fn stats(&self) -> UrlStats {
        self.stats
    }

    fn create(&mut self, image: ImageFile) -> ObjectUrl {
        self.next_id += 1;
        let url = ObjectUrl(format!("{URL_PREFIX}{}", self.next_id));
        self.blobs.insert(url.clone(), image);
        self.stats.created += 1;
        url
    }

    fn revoke(&mut self, url: &ObjectUrl) {
        // Invariant: only URLs minted by `create` and still in `blobs` count.
        if self.blobs.remove(url).is_some() {
            self.stats.revoked += 1;
        }
    }
}

impl Drop for ObjectUrlManager {
    fn drop(&mut self) {
        self.clear_all();
    }
}
