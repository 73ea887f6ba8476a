//! Queued sync operations and coalescing rules.

use crate::entity::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a queue entry (distinct from the entity id).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Creates a new random operation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OperationId({})", self.0)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of mutation a queued operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// The entity was created locally and does not exist remotely yet.
    Create,
    /// The entity exists remotely and was modified locally.
    Update,
    /// The entity was deleted locally.
    Delete,
}

impl OperationKind {
    /// Returns true for `Delete`.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, OperationKind::Delete)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Outcome of coalescing a newly enqueued kind against a pending one.
///
/// The queue holds at most one pending operation per entity, so every
/// enqueue against an already-queued entity resolves to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceDecision {
    /// The existing entry already covers the new intent; keep it
    /// (and its queue position) unchanged.
    KeepExisting,
    /// The new kind supersedes the pending entry; replace it in place.
    ReplaceWithNew,
    /// A `Create`/`Update` arrived for an entity with a pending `Delete`.
    /// Reusing an id across a not-yet-synced delete is rejected; callers
    /// must mint a fresh entity id instead.
    RejectReuseAfterDelete,
}

impl CoalesceDecision {
    /// Decides how a new kind coalesces with an existing pending kind.
    ///
    /// Rules:
    /// - pending `Create` + new `Update` stays `Create` (the not-yet-synced
    ///   create already sends the freshest payload at dispatch time)
    /// - anything + new `Delete` becomes `Delete` (the tombstone wins)
    /// - pending `Delete` + new `Create`/`Update` is rejected
    /// - a repeated `Create` or `Update` keeps the existing entry
    #[must_use]
    pub fn for_kinds(existing: OperationKind, new: OperationKind) -> Self {
        use OperationKind::{Create, Delete, Update};
        match (existing, new) {
            (Delete, Create) | (Delete, Update) => CoalesceDecision::RejectReuseAfterDelete,
            (_, Delete) => CoalesceDecision::ReplaceWithNew,
            (Create, Update) => CoalesceDecision::KeepExisting,
            (Create, Create) | (Update, Update) | (Update, Create) => {
                CoalesceDecision::KeepExisting
            }
        }
    }
}

/// A queued intent to create, update or delete one entity remotely.
///
/// The operation carries no payload: the coordinator re-reads the entity
/// from the local store at dispatch time so the freshest version is
/// always sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique id of this queue entry.
    pub id: OperationId,
    /// The entity this operation targets.
    pub entity_id: EntityId,
    /// The mutation kind.
    pub kind: OperationKind,
    /// When the operation was queued.
    pub enqueued_at: Timestamp,
    /// Number of failed upload attempts so far.
    pub retry_count: u32,
    /// Description of the most recent failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Operation {
    /// Creates a fresh operation with zero retries.
    pub fn new(entity_id: EntityId, kind: OperationKind, enqueued_at: Timestamp) -> Self {
        Self {
            id: OperationId::new(),
            entity_id,
            kind,
            enqueued_at,
            retry_count: 0,
            last_error: None,
        }
    }
}
