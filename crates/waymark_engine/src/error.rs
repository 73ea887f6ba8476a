//! Error types for the sync engine.

use crate::queue::QueueError;
use crate::remote::RemoteError;
use crate::store::StoreError;
use thiserror::Error;

/// Result type for sync passes.
pub type SyncResult<T> = Result<T, SyncError>;

/// Pass-level errors. Individual operation failures are isolated inside a
/// pass and surfaced through `SyncStatus`; these errors abort the whole
/// pass.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The connectivity monitor reports offline; no pass was started.
    #[error("network unreachable")]
    Offline,

    /// The pass was cancelled mid-flight.
    #[error("sync cancelled")]
    Cancelled,

    /// The operation queue could not be read or written.
    #[error("operation queue error: {0}")]
    Queue(#[from] QueueError),

    /// The local store could not be read or written.
    #[error("local store error: {0}")]
    Store(#[from] StoreError),

    /// The remote store failed wholesale (e.g. the download fetch).
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl SyncError {
    /// Returns true if the next scheduled trigger should retry the pass.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Offline | SyncError::Cancelled => true,
            SyncError::Queue(_) | SyncError::Store(_) => true,
            SyncError::Remote(e) => e.is_transient(),
        }
    }
}
