//! Durable operation queue.
//!
//! The queue is the single source of truth for "what still needs to be
//! sent". It holds at most one pending operation per entity (coalescing
//! per the rules in [`CoalesceDecision`]) and persists every mutation to
//! an append/remove journal so pending work survives process restarts.
//!
//! The journal is a JSON-lines file of enqueue/remove/fail events. On
//! open it is replayed in order to rebuild the pending set; once the
//! journal outgrows the live set it is compacted by atomically rewriting
//! a snapshot of the pending entries.

use crate::config::SyncConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use waymark_protocol::{CoalesceDecision, EntityId, Operation, OperationId, OperationKind, Timestamp};

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors from the operation queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Journal file could not be read or written.
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Journal contents could not be parsed.
    #[error("journal corrupt: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// A create/update was enqueued for an entity with a pending delete.
    /// Entity ids are never reused across a tombstone; the caller must
    /// mint a fresh id.
    #[error("entity {entity_id} has a pending delete; id reuse is rejected")]
    PendingDelete {
        /// The entity whose id was reused.
        entity_id: EntityId,
    },
}

impl QueueError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

/// One journal event.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JournalRecord {
    /// An operation entered the queue (or replaced a coalesced entry).
    Enqueued {
        /// The full operation.
        operation: Operation,
    },
    /// An operation left the queue (success or terminal drop).
    Removed {
        /// Queue-entry id.
        id: OperationId,
    },
    /// A transient upload failure was recorded against an operation.
    Failed {
        /// Queue-entry id.
        id: OperationId,
        /// Retry count after the failure.
        retry_count: u32,
        /// Failure description.
        error: String,
    },
}

/// Compact once the journal holds this many times the live entry count.
const COMPACT_FACTOR: usize = 4;
/// Never compact below this many journal records.
const COMPACT_MIN_RECORDS: usize = 64;

#[derive(Debug)]
struct Inner {
    /// Pending operations in FIFO enqueue order.
    entries: Vec<Operation>,
    /// Append handle for the journal.
    file: File,
    /// Records written since the last compaction (including replayed).
    records_written: usize,
}

/// A durable, ordered queue of pending mutations.
///
/// All mutations are serialized through an internal lock; reads return
/// clones so observers never hold the lock across I/O.
#[derive(Debug)]
pub struct OperationQueue {
    path: PathBuf,
    max_retries: u32,
    inner: Mutex<Inner>,
}

impl OperationQueue {
    /// Opens the queue, replaying any persisted journal at `path`.
    ///
    /// The retry budget comes from [`SyncConfig::max_retries`], so the
    /// queue and the coordinator always agree on when an operation is
    /// exhausted.
    ///
    /// Parent directories are created if missing. A partial final line
    /// (crash mid-append) is tolerated and discarded; malformed records
    /// elsewhere in the journal are reported as corruption.
    pub fn open(path: impl Into<PathBuf>, config: &SyncConfig) -> QueueResult<Self> {
        let max_retries = config.max_retries;
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            Self::replay(&path)?
        } else {
            Vec::new()
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let records_written = entries.len();

        tracing::debug!(
            path = %path.display(),
            pending = entries.len(),
            "operation queue opened"
        );

        Ok(Self {
            path,
            max_retries,
            inner: Mutex::new(Inner {
                entries,
                file,
                records_written,
            }),
        })
    }

    fn replay(path: &Path) -> QueueResult<Vec<Operation>> {
        let reader = BufReader::new(File::open(path)?);
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        let last = lines.len().saturating_sub(1);

        let mut entries: Vec<Operation> = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: JournalRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) if index == last => {
                    // Torn final write from a crash mid-append.
                    tracing::warn!(error = %e, "discarding partial final journal record");
                    continue;
                }
                Err(e) => {
                    return Err(QueueError::corrupt(format!(
                        "record {index}: {e}"
                    )));
                }
            };

            match record {
                JournalRecord::Enqueued { operation } => entries.push(operation),
                JournalRecord::Removed { id } => entries.retain(|op| op.id != id),
                JournalRecord::Failed {
                    id,
                    retry_count,
                    error,
                } => {
                    if let Some(op) = entries.iter_mut().find(|op| op.id == id) {
                        op.retry_count = retry_count;
                        op.last_error = Some(error);
                    }
                }
            }
        }

        Ok(entries)
    }

    fn append(inner: &mut Inner, record: &JournalRecord) -> QueueResult<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| QueueError::corrupt(format!("encode journal record: {e}")))?;
        line.push('\n');
        inner.file.write_all(line.as_bytes())?;
        inner.file.flush()?;
        inner.records_written += 1;
        Ok(())
    }

    /// Rewrites the journal as a snapshot of the live entries when it has
    /// grown past the compaction threshold.
    fn maybe_compact(&self, inner: &mut Inner) -> QueueResult<()> {
        if inner.records_written < COMPACT_MIN_RECORDS
            || inner.records_written < COMPACT_FACTOR * inner.entries.len().max(1)
        {
            return Ok(());
        }

        let tmp_path = self.path.with_extension("journal.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for operation in &inner.entries {
                let record = JournalRecord::Enqueued {
                    operation: operation.clone(),
                };
                let mut line = serde_json::to_string(&record)
                    .map_err(|e| QueueError::corrupt(format!("encode journal record: {e}")))?;
                line.push('\n');
                tmp.write_all(line.as_bytes())?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        inner.file = OpenOptions::new().append(true).open(&self.path)?;
        inner.records_written = inner.entries.len();
        tracing::debug!(live = inner.entries.len(), "journal compacted");
        Ok(())
    }

    /// Inserts or coalesces an operation for `entity_id`.
    ///
    /// Returns the id of the queue entry now covering the entity: either
    /// a fresh entry, or the pre-existing one when coalescing keeps it.
    /// A coalesced replacement keeps the original queue position.
    ///
    /// # Errors
    ///
    /// [`QueueError::PendingDelete`] when `kind` is `Create`/`Update` and
    /// the entity already has a queued delete.
    pub fn enqueue(
        &self,
        entity_id: EntityId,
        kind: OperationKind,
        now: Timestamp,
    ) -> QueueResult<OperationId> {
        let mut inner = self.inner.lock();

        if let Some(position) = inner.entries.iter().position(|op| op.entity_id == entity_id) {
            let existing = inner.entries[position].clone();
            match CoalesceDecision::for_kinds(existing.kind, kind) {
                CoalesceDecision::KeepExisting => {
                    tracing::debug!(
                        entity_id = %entity_id,
                        pending = %existing.kind,
                        requested = %kind,
                        "coalesced into pending operation"
                    );
                    return Ok(existing.id);
                }
                CoalesceDecision::ReplaceWithNew => {
                    let replacement = Operation::new(entity_id, kind, now);
                    Self::append(&mut inner, &JournalRecord::Removed { id: existing.id })?;
                    Self::append(
                        &mut inner,
                        &JournalRecord::Enqueued {
                            operation: replacement.clone(),
                        },
                    )?;
                    let id = replacement.id;
                    inner.entries[position] = replacement;
                    self.maybe_compact(&mut inner)?;
                    return Ok(id);
                }
                CoalesceDecision::RejectReuseAfterDelete => {
                    return Err(QueueError::PendingDelete { entity_id });
                }
            }
        }

        let operation = Operation::new(entity_id, kind, now);
        Self::append(
            &mut inner,
            &JournalRecord::Enqueued {
                operation: operation.clone(),
            },
        )?;
        let id = operation.id;
        inner.entries.push(operation);
        self.maybe_compact(&mut inner)?;
        Ok(id)
    }

    /// Returns up to `limit` pending operations in FIFO enqueue order.
    ///
    /// Entries are not removed; removal is explicit via
    /// [`mark_succeeded`](Self::mark_succeeded) or a terminal drop, so a
    /// crash mid-sync re-attempts operations instead of losing them.
    pub fn dequeue_batch(&self, limit: usize) -> Vec<Operation> {
        let inner = self.inner.lock();
        inner.entries.iter().take(limit).cloned().collect()
    }

    /// Atomically removes a confirmed operation from the queue.
    pub fn mark_succeeded(&self, id: OperationId) -> QueueResult<()> {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|op| op.id != id);
        if inner.entries.len() == before {
            // Already removed (e.g. superseded by a coalesced delete).
            return Ok(());
        }
        Self::append(&mut inner, &JournalRecord::Removed { id })?;
        self.maybe_compact(&mut inner)
    }

    /// Records a transient failure against an operation.
    ///
    /// Increments the retry count and stores the error. Returns `true`
    /// when the retry budget is exhausted, in which case the entry has
    /// also been removed from the queue and must not be retried again.
    pub fn mark_failed(&self, id: OperationId, error: &str) -> QueueResult<bool> {
        let mut inner = self.inner.lock();
        let Some(position) = inner.entries.iter().position(|op| op.id == id) else {
            return Ok(false);
        };

        inner.entries[position].retry_count += 1;
        inner.entries[position].last_error = Some(error.to_string());
        let operation = inner.entries[position].clone();

        let exhausted = operation.retry_count > self.max_retries;
        if exhausted {
            inner.entries.remove(position);
            Self::append(&mut inner, &JournalRecord::Removed { id })?;
            tracing::warn!(
                entity_id = %operation.entity_id,
                kind = %operation.kind,
                retry_count = operation.retry_count,
                last_error = error,
                "operation dropped: retries exhausted"
            );
        } else {
            Self::append(
                &mut inner,
                &JournalRecord::Failed {
                    id,
                    retry_count: operation.retry_count,
                    error: error.to_string(),
                },
            )?;
        }
        self.maybe_compact(&mut inner)?;
        Ok(exhausted)
    }

    /// Removes an operation unconditionally (permanent remote rejection).
    pub fn discard(&self, id: OperationId, reason: &str) -> QueueResult<()> {
        let mut inner = self.inner.lock();
        let Some(position) = inner.entries.iter().position(|op| op.id == id) else {
            return Ok(());
        };
        let operation = inner.entries.remove(position);
        Self::append(&mut inner, &JournalRecord::Removed { id })?;
        tracing::warn!(
            entity_id = %operation.entity_id,
            kind = %operation.kind,
            last_error = reason,
            "operation dropped: permanent failure"
        );
        self.maybe_compact(&mut inner)
    }

    /// Returns the number of pending operations.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns the pending operation for an entity, if any.
    pub fn pending_for(&self, entity_id: EntityId) -> Option<Operation> {
        self.inner
            .lock()
            .entries
            .iter()
            .find(|op| op.entity_id == entity_id)
            .cloned()
    }

    /// Forces journal contents to stable storage.
    pub fn sync(&self) -> QueueResult<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    /// Returns the journal path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
