//! Pending-write queue persisted in local storage.

use crate::error::StorageError;
use crate::now_millis;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use valsync_engine::{PendingSync, SyncQueue, ValuationPayload, QUEUE_KEY};

/// Ordered queue of writes made while offline.
#[async_trait]
pub trait PendingQueue: Send + Sync {
    /// Append a payload. Persisted before returning.
    async fn enqueue(&self, payload: &ValuationPayload) -> Result<PendingSync, StorageError>;

    /// Snapshot of the queue in replay order.
    async fn list(&self) -> Vec<PendingSync>;

    /// Remove exactly one entry. Returns whether it was queued.
    async fn remove(&self, entry_id: &str) -> Result<bool, StorageError>;

    /// Remove every entry for a valuation. Returns how many were dropped.
    async fn remove_valuation(&self, id: &str) -> Result<usize, StorageError>;

    /// Empty the queue.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Number of pending entries.
    async fn len(&self) -> usize {
        self.list().await.len()
    }

    /// Check if nothing is pending.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Queue stored as one JSON array under `val_sync_queue`.
///
/// Every mutation loads, changes and writes back the whole array under a
/// lock, and the store replaces values atomically, so a partial change is
/// never persisted. If the stored array cannot be read, the mutation fails
/// and nothing is written.
pub struct LocalQueue {
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl LocalQueue {
    /// Create a queue on top of a store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    async fn persist(&self, queue: &SyncQueue) -> Result<(), StorageError> {
        self.store.set(QUEUE_KEY, &queue.to_json()?).await
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut SyncQueue) -> T + Send,
    ) -> Result<T, StorageError> {
        let _guard = self.lock.lock().await;
        // a storage failure here must not be mistaken for an empty queue
        let raw = self.store.get(QUEUE_KEY).await?;
        let mut queue = SyncQueue::load(raw.as_deref());
        let out = f(&mut queue);
        self.persist(&queue).await?;
        Ok(out)
    }
}

#[async_trait]
impl PendingQueue for LocalQueue {
    async fn enqueue(&self, payload: &ValuationPayload) -> Result<PendingSync, StorageError> {
        let entry = PendingSync::new(
            uuid::Uuid::new_v4().to_string(),
            payload.clone(),
            now_millis(),
        );
        let queued = entry.clone();
        let for_valuation = self
            .mutate(move |queue| {
                let id = entry.id.clone();
                queue.push(entry).map(|()| queue.count_for(&id))
            })
            .await??;

        tracing::info!(
            valuation_id = %queued.id,
            entry_id = %queued.entry_id,
            for_valuation,
            "Queued write for sync"
        );
        Ok(queued)
    }

    async fn list(&self) -> Vec<PendingSync> {
        match self.store.get(QUEUE_KEY).await {
            Ok(raw) => SyncQueue::load(raw.as_deref()).into(),
            Err(e) => {
                tracing::warn!("Failed to read sync queue, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    async fn remove(&self, entry_id: &str) -> Result<bool, StorageError> {
        self.mutate(|queue| queue.remove_entry(entry_id)).await
    }

    async fn remove_valuation(&self, id: &str) -> Result<usize, StorageError> {
        self.mutate(|queue| queue.remove_valuation(id)).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        self.store.remove(QUEUE_KEY).await
    }
}
