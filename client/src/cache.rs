//! Cache store - last-known-good payload per valuation.

use crate::now_millis;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use std::sync::Arc;
use valsync_engine::{cache_key, CacheEntry, CacheMiss, ValuationPayload, CACHE_PREFIX};

/// Read-side fallback for valuations.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Overwrite the entry for `id` with `payload`, stamped with now.
    ///
    /// Never fails: if the storage rejects the write the entry is simply not
    /// updated.
    async fn save(&self, id: &str, payload: &ValuationPayload);

    /// The cached payload, or why there is none.
    async fn get(&self, id: &str) -> Result<ValuationPayload, CacheMiss>;

    /// Ids with a cached entry.
    async fn cached_ids(&self) -> Vec<String>;
}

/// Cache over a [`KeyValueStore`], one key per valuation.
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
}

impl LocalCache {
    /// Create a cache on top of a store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The full entry including its arrival time.
    pub async fn entry(&self, id: &str) -> Result<CacheEntry, CacheMiss> {
        let raw = self
            .store
            .get(&cache_key(id))
            .await
            .map_err(|e| CacheMiss::Malformed(e.to_string()))?;
        CacheEntry::decode(raw.as_deref())
    }
}

#[async_trait]
impl CacheStore for LocalCache {
    async fn save(&self, id: &str, payload: &ValuationPayload) {
        let entry = CacheEntry::new(payload.clone(), now_millis());
        let raw = match entry.encode() {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(valuation_id = %id, "Failed to cache valuation: {}", e);
                return;
            }
        };

        match self.store.set(&cache_key(id), &raw).await {
            Ok(()) => tracing::debug!(valuation_id = %id, "Cached valuation"),
            Err(e) => tracing::warn!(valuation_id = %id, "Failed to cache valuation: {}", e),
        }
    }

    async fn get(&self, id: &str) -> Result<ValuationPayload, CacheMiss> {
        match self.entry(id).await {
            Ok(entry) => {
                tracing::debug!(
                    valuation_id = %id,
                    age_ms = entry.age(now_millis()),
                    "Serving cached valuation"
                );
                Ok(entry.data)
            }
            Err(CacheMiss::Malformed(reason)) => {
                tracing::warn!(valuation_id = %id, "Ignoring malformed cache entry: {}", reason);
                Err(CacheMiss::Malformed(reason))
            }
            Err(miss) => Err(miss),
        }
    }

    async fn cached_ids(&self) -> Vec<String> {
        match self.store.keys().await {
            Ok(keys) => keys
                .into_iter()
                .filter_map(|key| key.strip_prefix(CACHE_PREFIX).map(str::to_string))
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to list cached valuations: {}", e);
                Vec::new()
            }
        }
    }
}
