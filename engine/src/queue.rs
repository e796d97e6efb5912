//! Pending-write queue - local edits not yet confirmed by the server.
//!
//! The queue is an ordered sequence persisted as a single JSON array under
//! `val_sync_queue`. Insertion order is replay order. Several entries may
//! target the same valuation; each carries its own `entry_id` so that
//! replaying one never drops another.

use crate::{error::Result, EntryId, Error, Timestamp, ValuationId, ValuationPayload};
use serde::{Deserialize, Serialize};

/// Storage key of the persisted queue.
pub const QUEUE_KEY: &str = "val_sync_queue";

/// A local write waiting to be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSync {
    /// Unique per entry. Empty for entries written by clients that predate it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entry_id: EntryId,
    /// Target valuation, always equal to `data.id`
    pub id: ValuationId,
    /// The payload as read from the sheet
    pub data: ValuationPayload,
    /// When the edit was queued (milliseconds since epoch)
    pub timestamp: Timestamp,
}

impl PendingSync {
    /// Create a queue entry for a payload.
    pub fn new(entry_id: impl Into<EntryId>, data: ValuationPayload, timestamp: Timestamp) -> Self {
        Self {
            entry_id: entry_id.into(),
            id: data.id.clone(),
            data,
            timestamp,
        }
    }
}

/// The ordered queue of pending writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncQueue {
    entries: Vec<PendingSync>,
}

impl SyncQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry at the end.
    pub fn push(&mut self, entry: PendingSync) -> Result<()> {
        entry.data.validate()?;
        if entry.entry_id.is_empty() {
            return Err(Error::InvalidQueue("entry id must not be empty".into()));
        }
        if self.contains(&entry.entry_id) {
            return Err(Error::InvalidQueue(format!(
                "duplicate entry id: {}",
                entry.entry_id
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// All entries in replay order.
    pub fn entries(&self) -> &[PendingSync] {
        &self.entries
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if an entry is still queued.
    pub fn contains(&self, entry_id: &str) -> bool {
        self.entries.iter().any(|e| e.entry_id == entry_id)
    }

    /// Remove one entry by its entry id. Returns whether it was present.
    pub fn remove_entry(&mut self, entry_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.entry_id != entry_id);
        self.entries.len() != before
    }

    /// Remove every entry targeting a valuation. Returns how many went.
    pub fn remove_valuation(&mut self, id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before - self.entries.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries targeting a valuation.
    pub fn count_for(&self, id: &str) -> usize {
        self.entries.iter().filter(|e| e.id == id).count()
    }

    /// Serialize to the persisted JSON array.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidQueue(e.to_string()))
    }

    /// Deserialize from the persisted JSON array.
    ///
    /// Entries without an entry id get a synthetic one derived from their
    /// position and timestamp, so they can still be removed one at a time.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut queue: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidQueue(e.to_string()))?;

        for (index, entry) in queue.entries.iter_mut().enumerate() {
            if entry.entry_id.is_empty() {
                entry.entry_id = format!("legacy-{}-{}", entry.timestamp, index);
            }
        }

        Ok(queue)
    }

    /// Load from an optional stored value. Missing or corrupt state is an
    /// empty queue.
    pub fn load(raw: Option<&str>) -> Self {
        raw.and_then(|json| Self::from_json(json).ok())
            .unwrap_or_default()
    }
}

impl From<SyncQueue> for Vec<PendingSync> {
    fn from(queue: SyncQueue) -> Self {
        queue.entries
    }
}
