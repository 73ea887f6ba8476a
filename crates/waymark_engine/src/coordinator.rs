//! The sync pass state machine.
//!
//! A pass runs two phases, always in order: upload the queued mutations,
//! then download remote state and merge it through the last-write-wins
//! resolver. Individual operation failures are isolated; pass-level
//! failures (local I/O, the download fetch) abort the pass and are
//! retried wholesale on the next trigger.

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::queue::OperationQueue;
use crate::remote::{RemoteError, RemoteStore};
use crate::store::LocalStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use waymark_protocol::{resolve, EntityId, Operation, OperationKind, RegionFilter, Resolution};

/// Observable sync state. Owned exclusively by the coordinator; readers
/// observe, never mutate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// No pass is running and none has completed yet.
    Idle,
    /// A pass is in flight.
    Syncing {
        /// Queued operations at the start of the pass.
        pending: usize,
    },
    /// The last pass completed cleanly.
    Success {
        /// Operations confirmed by the remote.
        uploaded: usize,
        /// Remote entities merged into the local store.
        downloaded: usize,
    },
    /// The last pass ended with a failure.
    Error {
        /// Human-readable failure description.
        message: String,
        /// Whether the next scheduled trigger should retry.
        retryable: bool,
    },
}

/// A queued operation dropped from the queue for good.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalDrop {
    /// The entity the operation targeted.
    pub entity_id: EntityId,
    /// The mutation kind that was lost.
    pub kind: OperationKind,
    /// The failure that caused the drop.
    pub error: String,
}

/// Result of one completed pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSummary {
    /// Operations confirmed by the remote.
    pub uploaded: usize,
    /// Remote entities merged into the local store.
    pub downloaded: usize,
    /// Operations dropped with no retry left.
    pub dropped: Vec<TerminalDrop>,
}

/// Cumulative statistics across passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that ran to completion (with or without drops).
    pub passes_completed: u64,
    /// Total operations uploaded.
    pub uploaded: u64,
    /// Total entities downloaded.
    pub downloaded: u64,
    /// Total operations terminally dropped.
    pub terminal_drops: u64,
    /// Most recent pass-level error message.
    pub last_error: Option<String>,
}

/// Orchestrates upload and download against the remote store.
pub struct SyncCoordinator {
    config: SyncConfig,
    queue: Arc<OperationQueue>,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    clock: Arc<dyn Clock>,
    region: RwLock<Option<RegionFilter>>,
    status: RwLock<SyncStatus>,
    status_subscribers: RwLock<Vec<Sender<SyncStatus>>>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl SyncCoordinator {
    /// Creates a coordinator over the given collaborators.
    pub fn new(
        config: SyncConfig,
        queue: Arc<OperationQueue>,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<ConnectivityMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            queue,
            store,
            remote,
            connectivity,
            clock,
            region: RwLock::new(None),
            status: RwLock::new(SyncStatus::Idle),
            status_subscribers: RwLock::new(Vec::new()),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the configuration this coordinator runs under.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sets the caller-supplied region filter for the download phase.
    ///
    /// Passed through to the remote store verbatim; the coordinator never
    /// interprets it.
    pub fn set_region_filter(&self, filter: Option<RegionFilter>) {
        *self.region.write() = filter;
    }

    /// Returns the current status.
    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    /// Subscribes to status transitions.
    pub fn subscribe_status(&self) -> Receiver<SyncStatus> {
        let (tx, rx) = mpsc::channel();
        self.status_subscribers.write().push(tx);
        rx
    }

    /// Returns cumulative statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Requests cancellation of an in-flight pass.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears the cancellation flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_status(&self, status: SyncStatus) {
        *self.status.write() = status.clone();
        let mut subscribers = self.status_subscribers.write();
        subscribers.retain(|tx| tx.send(status.clone()).is_ok());
    }

    /// Runs one full sync pass: upload, then download.
    ///
    /// Never starts while offline. Errors returned here are pass-level;
    /// per-operation failures are absorbed into the pass summary and the
    /// resulting [`SyncStatus`].
    pub fn run_pass(&self) -> SyncResult<PassSummary> {
        if !self.connectivity.is_online() {
            return Err(SyncError::Offline);
        }

        let previous = self.status();
        self.set_status(SyncStatus::Syncing {
            pending: self.queue.pending_count(),
        });

        match self.run_phases() {
            Ok(summary) => {
                let status = if summary.dropped.is_empty() {
                    SyncStatus::Success {
                        uploaded: summary.uploaded,
                        downloaded: summary.downloaded,
                    }
                } else {
                    SyncStatus::Error {
                        message: format!(
                            "{} operation(s) dropped; first: {}",
                            summary.dropped.len(),
                            summary.dropped[0].error
                        ),
                        retryable: false,
                    }
                };
                self.set_status(status);

                let mut stats = self.stats.write();
                stats.passes_completed += 1;
                stats.uploaded += summary.uploaded as u64;
                stats.downloaded += summary.downloaded as u64;
                stats.terminal_drops += summary.dropped.len() as u64;
                stats.last_error = summary.dropped.first().map(|d| d.error.clone());
                drop(stats);

                tracing::info!(
                    uploaded = summary.uploaded,
                    downloaded = summary.downloaded,
                    dropped = summary.dropped.len(),
                    "sync pass completed"
                );
                Ok(summary)
            }
            Err(SyncError::Cancelled) => {
                // Unprocessed operations stay queued for the next trigger,
                // and the last completed outcome stays observable.
                self.set_status(previous);
                Err(SyncError::Cancelled)
            }
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                self.set_status(SyncStatus::Error {
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                });
                tracing::warn!(error = %e, "sync pass aborted");
                Err(e)
            }
        }
    }

    fn run_phases(&self) -> SyncResult<PassSummary> {
        let mut summary = PassSummary::default();
        self.upload(&mut summary)?;
        // Download runs even when upload left terminal drops behind, as
        // long as connectivity holds and the pass itself is healthy.
        self.download(&mut summary)?;
        Ok(summary)
    }

    /// Upload phase: attempt every queued operation exactly once.
    ///
    /// Operations that fail transiently stay queued with their retry
    /// count bumped; the scheduler's interval provides the backoff.
    fn upload(&self, summary: &mut PassSummary) -> SyncResult<()> {
        // Snapshot up front: entries that fail stay queued, and we must
        // not pick them up again within this pass.
        let pending = self.queue.dequeue_batch(usize::MAX);
        tracing::debug!(pending = pending.len(), "upload phase started");

        for batch in pending.chunks(self.config.upload_batch_size.max(1)) {
            for operation in batch {
                self.check_cancelled()?;
                self.dispatch(operation, summary)?;
            }
        }
        Ok(())
    }

    fn dispatch(&self, operation: &Operation, summary: &mut PassSummary) -> SyncResult<()> {
        // Re-read at dispatch time so the freshest payload is sent.
        let entity = self.store.get(operation.entity_id)?;

        let result = match (operation.kind, entity) {
            (OperationKind::Delete, _) => self.remote.delete(operation.entity_id),
            (OperationKind::Create, Some(entity)) => self.remote.insert(&entity),
            (OperationKind::Update, Some(entity)) => self.remote.update(&entity),
            (kind, None) => {
                // The local copy vanished without a coalesced delete; the
                // queue and store diverged (facade contract violation).
                let reason = format!("local copy missing for pending {kind}");
                self.queue.discard(operation.id, &reason)?;
                summary.dropped.push(TerminalDrop {
                    entity_id: operation.entity_id,
                    kind,
                    error: reason,
                });
                return Ok(());
            }
        };

        match result {
            Ok(()) => {
                self.queue.mark_succeeded(operation.id)?;
                summary.uploaded += 1;
            }
            Err(RemoteError::Transient { message }) => {
                let exhausted = self.queue.mark_failed(operation.id, &message)?;
                if exhausted {
                    summary.dropped.push(TerminalDrop {
                        entity_id: operation.entity_id,
                        kind: operation.kind,
                        error: message,
                    });
                }
            }
            Err(RemoteError::Permanent { message }) => {
                self.queue.discard(operation.id, &message)?;
                summary.dropped.push(TerminalDrop {
                    entity_id: operation.entity_id,
                    kind: operation.kind,
                    error: message,
                });
            }
        }
        Ok(())
    }

    /// Download phase: fetch remote state and merge it locally.
    ///
    /// Entities present locally but absent remotely are left alone:
    /// deletion is only ever driven by explicit delete operations, never
    /// inferred from absence (a partial or paginated fetch must not read
    /// as "everything else was deleted").
    fn download(&self, summary: &mut PassSummary) -> SyncResult<()> {
        self.check_cancelled()?;

        let region = *self.region.read();
        let remote_entities = self.remote.list(region.as_ref())?;
        tracing::debug!(count = remote_entities.len(), "download phase started");

        for remote_entity in remote_entities {
            self.check_cancelled()?;

            let pending = self.queue.pending_for(remote_entity.id);
            if pending.as_ref().is_some_and(|op| op.kind.is_delete()) {
                // A queued local delete tombstones this id; merging the
                // remote copy back in would resurrect it.
                continue;
            }

            match self.store.get(remote_entity.id)? {
                None => {
                    self.store.upsert(remote_entity)?;
                    summary.downloaded += 1;
                }
                Some(local) => match resolve(&local, &remote_entity) {
                    Resolution::FromRemote => {
                        if local != remote_entity {
                            self.store.upsert(remote_entity)?;
                            summary.downloaded += 1;
                        }
                    }
                    Resolution::FromLocal => {
                        if pending.is_none() {
                            // The local copy is newer but nothing is
                            // queued to upload it; a queue entry was lost
                            // to a prior crash. Re-enqueue it.
                            tracing::warn!(
                                entity_id = %local.id,
                                "newer local copy had no queued upload; re-enqueued"
                            );
                            self.queue.enqueue(
                                local.id,
                                OperationKind::Update,
                                self.clock.now(),
                            )?;
                        }
                    }
                },
            }
        }
        Ok(())
    }
}
