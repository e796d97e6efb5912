//! Sync controller - the read, write and drain flows.
//!
//! Every flow is a single user action. Nothing here retries on its own:
//! a failed write is reported, a conflict is handed to a [`ConflictResolver`],
//! and queued offline writes only go out when [`SyncController::drain`] is
//! called.

use crate::adapter::SpreadsheetAdapter;
use crate::api::ValuationApi;
use crate::cache::CacheStore;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Result, SyncError};
use crate::queue::PendingQueue;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use valsync_engine::{EntryId, ReadSource, ValuationId, WriteFlow, WriteState};

/// Result of pulling a valuation into the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub id: ValuationId,
    pub source: ReadSource,
}

impl LoadReport {
    /// Status line for the user.
    pub fn message(&self) -> &'static str {
        match self.source {
            ReadSource::Network => "Loaded from server",
            ReadSource::Cache => "Loaded from Cache (Offline)",
            ReadSource::CacheAfterError => "Loaded from Cache (Network Error)",
        }
    }
}

/// How a push from the sheet ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The conditional write was accepted
    Updated,
    /// A conflict was resolved by forcing the local version
    Overwritten,
    /// Offline; the write waits in the queue
    Queued { pending: usize },
    /// A conflict was resolved by dropping the local write
    Abandoned,
}

impl WriteOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Updated => "Update Successful!".to_string(),
            Self::Overwritten => "Overwrite Successful!".to_string(),
            Self::Queued { pending } => {
                format!("Offline: Changes queued for sync ({} pending)", pending)
            }
            Self::Abandoned => {
                "Update cancelled. Please refresh data before editing again.".to_string()
            }
        }
    }
}

/// A conditional write the server refused because its version moved on.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub valuation_id: ValuationId,
    /// Version the local edit was based on
    pub etag: Option<String>,
    /// Server's explanation
    pub message: String,
}

/// The user's answer to a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Send the same write again without a precondition
    Overwrite,
    /// Drop the local write
    Abandon,
}

/// Asks the user what to do about a conflict.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    async fn resolve(&self, conflict: &Conflict) -> Resolution;
}

/// Resolver that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedResolution(pub Resolution);

#[async_trait]
impl ConflictResolver for FixedResolution {
    async fn resolve(&self, _conflict: &Conflict) -> Resolution {
        self.0
    }
}

/// A queued write that failed to replay. It stays in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItemFailure {
    pub entry_id: EntryId,
    pub valuation_id: ValuationId,
    /// HTTP status, when the server answered
    pub status: Option<u16>,
    pub error: String,
}

/// Summary of a queue drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub synced: usize,
    pub failures: Vec<QueueItemFailure>,
}

impl DrainReport {
    pub fn message(&self) -> String {
        format!(
            "Processed queue: {} synced of {} attempted",
            self.synced, self.attempted
        )
    }
}

/// Snapshot for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub offline: bool,
    pub pending: usize,
    /// Valuations readable while offline
    pub cached: Vec<ValuationId>,
    /// State of the most recent push
    pub last_write: WriteState,
}

/// Coordinates the API, the local cache and queue, and the sheet.
///
/// One push runs at a time: a push started while another is still between
/// `Reading` and a terminal state is refused.
#[derive(Clone)]
pub struct SyncController {
    api: Arc<dyn ValuationApi>,
    cache: Arc<dyn CacheStore>,
    queue: Arc<dyn PendingQueue>,
    connectivity: Arc<ConnectivityMonitor>,
    sheet: SpreadsheetAdapter,
    flow: Arc<Mutex<WriteFlow>>,
}

impl SyncController {
    pub fn new(
        api: Arc<dyn ValuationApi>,
        cache: Arc<dyn CacheStore>,
        queue: Arc<dyn PendingQueue>,
        connectivity: Arc<ConnectivityMonitor>,
        sheet: SpreadsheetAdapter,
    ) -> Self {
        Self {
            api,
            cache,
            queue,
            connectivity,
            sheet,
            flow: Arc::new(Mutex::new(WriteFlow::new())),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    fn flow(&self) -> MutexGuard<'_, WriteFlow> {
        self.flow.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn step(&self, next: WriteState) -> Result<()> {
        self.flow().advance(next)?;
        Ok(())
    }

    /// State of the most recent push, `Idle` if none ran.
    pub fn write_state(&self) -> WriteState {
        self.flow().state()
    }

    /// States the most recent push went through.
    pub fn write_history(&self) -> Vec<WriteState> {
        self.flow().history().to_vec()
    }

    /// Pull a valuation into the sheet.
    ///
    /// Offline, the cache is the only source. Online, a fresh export is
    /// written through to the cache; if the export fails the cache is used
    /// instead, and only if that misses too is the network error returned.
    pub async fn load_to_sheet(&self, id: &str) -> Result<LoadReport> {
        let (payload, source) = if self.connectivity.is_offline() {
            let payload = self
                .cache
                .get(id)
                .await
                .map_err(|_| SyncError::NoCachedData(id.to_string()))?;
            (payload, ReadSource::Cache)
        } else {
            match self.api.export(id).await {
                Ok(payload) => {
                    self.cache.save(id, &payload).await;
                    (payload, ReadSource::Network)
                }
                Err(err) => {
                    tracing::warn!(valuation_id = %id, "Export failed, trying cache: {}", err);
                    match self.cache.get(id).await {
                        Ok(payload) => (payload, ReadSource::CacheAfterError),
                        Err(_) => return Err(SyncError::Network(err)),
                    }
                }
            }
        };

        self.sheet.write_valuation(&payload).await?;

        let report = LoadReport {
            id: id.to_string(),
            source,
        };
        if source.is_cached() {
            tracing::warn!(valuation_id = %id, "{}", report.message());
        } else {
            tracing::info!(valuation_id = %id, "{}", report.message());
        }
        Ok(report)
    }

    /// Push the sheet's inputs to the platform.
    ///
    /// Offline, the write is queued. Online, it is sent conditionally on the
    /// version token read from the sheet. A conflict is put to `resolver`;
    /// overwriting sends exactly one more, unconditional, write. Any other
    /// failure is returned and nothing is queued.
    pub async fn sync_to_platform(&self, resolver: &dyn ConflictResolver) -> Result<WriteOutcome> {
        {
            let mut flow = self.flow();
            flow.reset()?;
            flow.advance(WriteState::Reading)?;
        }

        let payload = match self.sheet.read_valuation().await {
            Ok(payload) => payload,
            Err(e) => {
                self.step(WriteState::Failed)?;
                return Err(e.into());
            }
        };

        if self.connectivity.is_offline() {
            let entry = match self.queue.enqueue(&payload).await {
                Ok(entry) => entry,
                Err(e) => {
                    self.step(WriteState::Failed)?;
                    return Err(e.into());
                }
            };
            self.step(WriteState::Queued)?;

            let pending = self.queue.len().await;
            tracing::info!(
                valuation_id = %entry.id,
                pending,
                "Offline: Changes queued for sync"
            );
            return Ok(WriteOutcome::Queued { pending });
        }

        self.step(WriteState::Submitting)?;
        let request = payload.import_request();

        match self.api.import(&request, payload.etag.as_deref()).await {
            Ok(()) => {
                self.step(WriteState::Success)?;
                tracing::info!(valuation_id = %payload.id, "Valuation updated");
                Ok(WriteOutcome::Updated)
            }
            Err(e) if e.is_conflict() => {
                self.step(WriteState::Conflict)?;
                tracing::warn!(valuation_id = %payload.id, "{}", e);

                let conflict = Conflict {
                    valuation_id: payload.id.clone(),
                    etag: payload.etag.clone(),
                    message: e.to_string(),
                };

                match resolver.resolve(&conflict).await {
                    Resolution::Abandon => {
                        self.step(WriteState::Abandoned)?;
                        tracing::info!(valuation_id = %payload.id, "Local write abandoned");
                        Ok(WriteOutcome::Abandoned)
                    }
                    Resolution::Overwrite => match self.api.import(&request, None).await {
                        Ok(()) => {
                            self.step(WriteState::Success)?;
                            tracing::info!(valuation_id = %payload.id, "Server version overwritten");
                            Ok(WriteOutcome::Overwritten)
                        }
                        Err(e) => {
                            self.step(WriteState::Failed)?;
                            Err(e.into())
                        }
                    },
                }
            }
            Err(e) => {
                self.step(WriteState::Failed)?;
                tracing::error!(valuation_id = %payload.id, "Write failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Replay queued writes, oldest first, one at a time.
    ///
    /// Replays are unconditional. Each success removes exactly its own entry;
    /// a failure is recorded and the drain moves on.
    pub async fn drain(&self) -> Result<DrainReport> {
        if self.connectivity.is_offline() {
            return Err(SyncError::Offline);
        }

        let entries = self.queue.list().await;
        let mut report = DrainReport {
            attempted: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            let request = entry.data.import_request();

            let failure = match self.api.import(&request, None).await {
                Ok(()) => match self.queue.remove(&entry.entry_id).await {
                    Ok(_) => None,
                    Err(e) => Some((None, e.to_string())),
                },
                Err(e) => Some((e.status_code(), e.to_string())),
            };

            match failure {
                None => {
                    report.synced += 1;
                    tracing::debug!(
                        valuation_id = %entry.id,
                        entry_id = %entry.entry_id,
                        "Replayed queued write"
                    );
                }
                Some((status, error)) => {
                    tracing::warn!(
                        valuation_id = %entry.id,
                        entry_id = %entry.entry_id,
                        ?status,
                        "Queued write failed: {}",
                        error
                    );
                    report.failures.push(QueueItemFailure {
                        entry_id: entry.entry_id.clone(),
                        valuation_id: entry.id.clone(),
                        status,
                        error,
                    });
                }
            }
        }

        tracing::info!("{}", report.message());
        Ok(report)
    }

    /// Number of queued writes.
    pub async fn pending_count(&self) -> usize {
        self.queue.len().await
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            offline: self.connectivity.is_offline(),
            pending: self.pending_count().await,
            cached: self.cache.cached_ids().await,
            last_write: self.write_state(),
        }
    }

    /// Drop every queued write for a valuation.
    pub async fn discard(&self, id: &str) -> Result<usize> {
        let removed = self.queue.remove_valuation(id).await?;
        tracing::info!(valuation_id = %id, removed, "Discarded queued writes");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_messages() {
        assert_eq!(
            WriteOutcome::Queued { pending: 2 }.message(),
            "Offline: Changes queued for sync (2 pending)"
        );
        assert!(WriteOutcome::Abandoned.message().contains("refresh"));
    }

    #[test]
    fn load_messages() {
        let report = LoadReport {
            id: "V1".into(),
            source: ReadSource::CacheAfterError,
        };
        assert_eq!(report.message(), "Loaded from Cache (Network Error)");
    }

    #[test]
    fn drain_message() {
        let report = DrainReport {
            attempted: 3,
            synced: 2,
            failures: vec![],
        };
        assert_eq!(report.message(), "Processed queue: 2 synced of 3 attempted");
    }

    #[tokio::test]
    async fn fixed_resolution_answers() {
        let conflict = Conflict {
            valuation_id: "V1".into(),
            etag: Some("abc".into()),
            message: "changed".into(),
        };
        assert_eq!(
            FixedResolution(Resolution::Abandon).resolve(&conflict).await,
            Resolution::Abandon
        );
    }
}
