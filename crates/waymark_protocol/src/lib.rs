//! # Waymark Sync Protocol
//!
//! Entity, operation and conflict-resolution types for the Waymark
//! offline-first sync engine.
//!
//! This crate provides:
//! - [`Entity`] / [`EntityId`] for synchronizable records
//! - [`Operation`] / [`OperationKind`] for queued mutations
//! - Coalescing rules ([`CoalesceDecision`]) for the operation queue
//! - The last-write-wins conflict resolver ([`resolve`])
//! - Wire types for the remote CRUD API ([`RegionFilter`])
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod entity;
mod operation;
mod wire;

pub use conflict::{resolve, Resolution};
pub use entity::{Entity, EntityId, Timestamp};
pub use operation::{CoalesceDecision, Operation, OperationId, OperationKind};
pub use wire::RegionFilter;
