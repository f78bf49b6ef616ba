//! Locally hidden credential ids.
//!
//! Hiding is a display filter only; nothing on the ledger changes. The set is
//! stored as a JSON array of object ids under [`HIDDEN_SET_KEY`] and written
//! back on every mutation.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::kv::KeyValueStore;

/// Storage key of the hidden set.
pub const HIDDEN_SET_KEY: &str = "suivitae-hidden-certificates";

/// Set of hidden credential object ids backed by a [`KeyValueStore`].
pub struct HiddenSet {
    store: Arc<dyn KeyValueStore>,
    ids: RwLock<BTreeSet<String>>,
}

impl HiddenSet {
    /// Load the set. A missing value is empty; a corrupt value is logged and treated as empty.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let ids = match store.get(HIDDEN_SET_KEY)? {
            None => BTreeSet::new(),
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    warn!(error = %e, "hidden set is corrupt, starting empty");
                    BTreeSet::new()
                }
            },
        };
        debug!(count = ids.len(), "loaded hidden set");
        Ok(Self {
            store,
            ids: RwLock::new(ids),
        })
    }

    /// Hide an id. Returns `true` if the set changed.
    pub fn hide(&self, object_id: &str) -> Result<bool> {
        let object_id = object_id.trim();
        if object_id.is_empty() {
            return Ok(false);
        }
        self.mutate(|ids| ids.insert(object_id.to_string()))
    }

    /// Unhide an id. Returns `true` if the set changed.
    pub fn unhide(&self, object_id: &str) -> Result<bool> {
        self.mutate(|ids| ids.remove(object_id.trim()))
    }

    pub fn is_hidden(&self, object_id: &str) -> bool {
        self.ids.read().contains(object_id.trim())
    }

    /// Unhide everything. Returns how many ids were removed.
    pub fn clear_all(&self) -> Result<usize> {
        let mut ids = self.ids.write();
        let removed = ids.len();
        self.persist(&BTreeSet::new())?;
        ids.clear();
        Ok(removed)
    }

    /// Hidden ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.ids.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Apply a change to a copy, persist it, then publish it.
    fn mutate(&self, change: impl FnOnce(&mut BTreeSet<String>) -> bool) -> Result<bool> {
        let mut ids = self.ids.write();
        let mut next = ids.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        self.persist(&next)?;
        *ids = next;
        Ok(true)
    }

    fn persist(&self, ids: &BTreeSet<String>) -> Result<()> {
        let json = serde_json::to_string(&ids.iter().collect::<Vec<_>>())
            .context("Failed to serialize hidden set")?;
        self.store
            .set(HIDDEN_SET_KEY, &json)
            .context("Failed to persist hidden set")
    }
}
