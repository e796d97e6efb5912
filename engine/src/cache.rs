//! Cached valuation entries and their persisted encoding.
//!
//! Each entry lives under its own key, `val_cache_<id>`, as JSON
//! `{ "data": <payload>, "timestamp": <epoch millis> }`.

use crate::{error::CacheMiss, Error, Timestamp, ValuationPayload};
use serde::{Deserialize, Serialize};

/// Key prefix for cached valuations.
pub const CACHE_PREFIX: &str = "val_cache_";

/// Storage key for a cached valuation.
pub fn cache_key(id: &str) -> String {
    format!("{CACHE_PREFIX}{id}")
}

/// Last-known-good payload for one valuation.
///
/// The timestamp records when the payload arrived on this client. It is not
/// a version and never replaces the etag check on writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: ValuationPayload,
    pub timestamp: Timestamp,
}

impl CacheEntry {
    /// Create a new entry stamped with the arrival time.
    pub fn new(data: ValuationPayload, timestamp: Timestamp) -> Self {
        Self { data, timestamp }
    }

    /// Encode for storage.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|_| Error::CacheEncode(self.data.id.clone()))
    }

    /// Decode a raw stored value.
    ///
    /// `None` (nothing stored) and unparseable content are both misses.
    pub fn decode(raw: Option<&str>) -> Result<Self, CacheMiss> {
        let raw = raw.ok_or(CacheMiss::Absent)?;
        serde_json::from_str(raw).map_err(|e| CacheMiss::Malformed(e.to_string()))
    }

    /// Age of the entry relative to `now`, saturating at zero.
    pub fn age(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.timestamp)
    }
}
