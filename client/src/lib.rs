//! # Valsync Client
//!
//! Offline-tolerant synchronization between a spreadsheet and the valuation
//! platform.
//!
//! The client pulls valuations into a worksheet, pushes edited inputs back
//! with optimistic concurrency, and keeps working when the network does not:
//! reads fall back to a local cache and writes wait in a persisted queue
//! until the user drains it.
//!
//! ## Wiring
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use valsync_client::{
//!     ConnectivityMonitor, FileStore, HttpValuationApi, JsonFileWorksheet, LocalCache,
//!     LocalQueue, SpreadsheetAdapter, SyncController,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileStore::open(".valsync/store").await?);
//! let api = HttpValuationApi::new("http://localhost:8000/api/excel", None, Duration::from_secs(30))?;
//!
//! let controller = SyncController::new(
//!     Arc::new(api),
//!     Arc::new(LocalCache::new(store.clone())),
//!     Arc::new(LocalQueue::new(store)),
//!     Arc::new(ConnectivityMonitor::new(true)),
//!     SpreadsheetAdapter::new(Arc::new(JsonFileWorksheet::new(".valsync/sheet.json"))),
//! );
//!
//! let report = controller.load_to_sheet("V1").await?;
//! println!("{}", report.message());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod api;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod queue;
pub mod storage;
pub mod workbook;

pub use adapter::SpreadsheetAdapter;
pub use api::{HttpValuationApi, RunSummary, ValuationApi};
pub use cache::{CacheStore, LocalCache};
pub use config::{Config, ConfigError};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use controller::{
    Conflict, ConflictResolver, DrainReport, FixedResolution, LoadReport, QueueItemFailure,
    Resolution, SyncController, SyncStatus, WriteOutcome,
};
pub use error::{ApiError, SheetError, StorageError, SyncError};
pub use queue::{LocalQueue, PendingQueue};
pub use storage::{FileStore, KeyValueStore, MemoryStore, AUTH_TOKEN_KEY};
pub use workbook::{JsonFileWorksheet, MemoryWorksheet, Worksheet};

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
