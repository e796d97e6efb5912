//! Error types for the valsync engine.

use crate::ValuationId;
use thiserror::Error;

/// All possible errors from the valsync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Payload errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("payload has no valuation id")]
    MissingValuationId,

    // Persisted state errors
    #[error("invalid queue state: {0}")]
    InvalidQueue(String),

    #[error("failed to encode cache entry for {0}")]
    CacheEncode(ValuationId),

    // Sheet errors
    #[error("sheet has no '{0}' marker")]
    MissingMarker(&'static str),

    // Flow errors
    #[error("invalid write transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a cache lookup produced nothing.
///
/// Both variants are a cache miss for every caller; they are kept apart so
/// that corrupt local state can be logged without being surfaced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    #[error("no cached entry")]
    Absent,

    #[error("cached entry is malformed: {0}")]
    Malformed(String),
}
