//! # Waymark Sync Engine
//!
//! Offline-first synchronization engine: reconciles a local mutable cache
//! with a remote authoritative store under intermittent connectivity.
//!
//! This crate provides:
//! - Durable, coalescing operation queue with a journal that survives
//!   process restarts
//! - Two-phase sync coordinator (upload pending operations, then download
//!   and merge remote state with last-write-wins)
//! - Connectivity monitor with de-duplicated reachability transitions
//! - Trigger-driven scheduler with single-flight passes
//!
//! ## Architecture
//!
//! Local writes go through a repository facade owned by the caller: the
//! facade applies the mutation to the [`LocalStore`] and enqueues a
//! matching [`Operation`](waymark_protocol::Operation) in the same logical
//! transaction. The [`SyncScheduler`] later drives the
//! [`SyncCoordinator`], which drains the queue against the [`RemoteStore`]
//! and then pulls remote state back in through the conflict resolver.
//!
//! ## Key invariants
//!
//! - Upload always precedes download within a pass
//! - At most one pending operation per entity id
//! - A delete tombstone supersedes any pending create/update
//! - Exactly one pass is in flight at any time
//! - Download never deletes on remote absence

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod connectivity;
mod coordinator;
mod error;
mod queue;
mod remote;
mod scheduler;
mod store;

pub use clock::{AuthProvider, Clock, ManualClock, StaticAuth, SystemClock};
pub use config::SyncConfig;
pub use connectivity::ConnectivityMonitor;
pub use coordinator::{PassSummary, SyncCoordinator, SyncStats, SyncStatus, TerminalDrop};
pub use error::{SyncError, SyncResult};
pub use queue::{OperationQueue, QueueError, QueueResult};
pub use remote::{
    HttpClient, HttpRemote, HttpResponse, MockRemote, RemoteCall, RemoteError, RemoteResult,
    RemoteStore,
};
pub use scheduler::SyncScheduler;
pub use store::{LocalStore, MemoryStore, StoreError, StoreEvent, StoreResult};
