//! # Valsync Engine
//!
//! Offline-capable synchronization logic for valuation data edited in a
//! spreadsheet.
//!
//! This crate holds the parts of the sync subsystem that need no IO: the
//! payload model, the persisted layout of the local cache and pending-write
//! queue, the two-region sheet projection, and the state machine of a push.
//! The async side (storage, HTTP, the worksheet host) lives in
//! `valsync-client`.
//!
//! ## Core Concepts
//!
//! ### Payloads
//!
//! A [`ValuationPayload`] is one valuation run: nested `inputs`, read-only
//! `outputs`, and an optional `etag` version token issued by the server.
//! A payload with an etag is written conditionally; without one the write
//! is forced.
//!
//! ### Cache and queue
//!
//! - [`CacheEntry`] - the last-known-good payload per valuation, stored under
//!   `val_cache_<id>`. Absent and corrupt entries are both a [`CacheMiss`].
//! - [`SyncQueue`] - ordered [`PendingSync`] entries stored under
//!   `val_sync_queue`. Insertion order is replay order.
//!
//! ### Sheet layout
//!
//! [`SheetLayout::project`] lays a payload out as an editable `Assumptions`
//! region and a locked `Results` region with dotted keys.
//! [`SheetReadback::scan`] reverses it for the inputs.
//!
//! ## Quick Start
//!
//! ```rust
//! use valsync_engine::{SheetLayout, SheetReadback, ValuationPayload};
//! use serde_json::json;
//!
//! let payload = ValuationPayload::from_value(json!({
//!     "id": "V1",
//!     "inputs": {"growth": {"rate": 0.05}},
//!     "outputs": {"enterprise_value": 1200},
//!     "etag": "abc"
//! }))
//! .unwrap();
//!
//! let layout = SheetLayout::project(&payload);
//! let back = SheetReadback::scan(&layout.values())
//!     .unwrap()
//!     .into_payload()
//!     .unwrap();
//!
//! assert_eq!(back.inputs, payload.inputs);
//! assert_eq!(back.etag.as_deref(), Some("abc"));
//! ```

pub mod cache;
pub mod error;
pub mod flatten;
pub mod flow;
pub mod payload;
pub mod queue;
pub mod sheet;

// Re-export main types at crate root
pub use cache::{cache_key, CacheEntry, CACHE_PREFIX};
pub use error::{CacheMiss, Error};
pub use flatten::{flatten, unflatten};
pub use flow::{ReadSource, WriteFlow, WriteState};
pub use payload::{ImportRequest, ValuationPayload};
pub use queue::{PendingSync, SyncQueue, QUEUE_KEY};
pub use sheet::{Cell, CellStyle, CellValue, SheetLayout, SheetReadback};

/// Type aliases for clarity
pub type ValuationId = String;
pub type EntryId = String;
pub type ETag = String;
pub type Timestamp = u64;
