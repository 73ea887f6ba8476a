//! Local cache interface.
//!
//! The local store is the mutable cache the UI reads from and the sync
//! coordinator reconciles into. Implementations must serialize writes
//! while allowing concurrent reads; change notifications let observers
//! (the repository facade, a UI layer) react without polling.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;
use waymark_protocol::{Entity, EntityId};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the local store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing storage could not be read or written.
    #[error("store I/O error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
    },

    /// An update or delete targeted an id that does not exist.
    #[error("entity {entity_id} not found")]
    NotFound {
        /// The missing entity id.
        entity_id: EntityId,
    },
}

impl StoreError {
    /// Creates an I/O error with the given message.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

/// A change notification from the local store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// An entity was inserted or overwritten.
    Upserted(Entity),
    /// An entity was deleted.
    Deleted(EntityId),
}

/// The local mutable cache of entities.
pub trait LocalStore: Send + Sync {
    /// Returns the entity with the given id, if present.
    fn get(&self, id: EntityId) -> StoreResult<Option<Entity>>;

    /// Returns all entities.
    fn list(&self) -> StoreResult<Vec<Entity>>;

    /// Inserts or overwrites an entity.
    fn upsert(&self, entity: Entity) -> StoreResult<()>;

    /// Deletes an entity. Deleting an absent id is not an error.
    fn delete(&self, id: EntityId) -> StoreResult<()>;

    /// Subscribes to change notifications.
    fn subscribe(&self) -> Receiver<StoreEvent>;
}

/// An in-memory local store.
///
/// Writes go through a single `RwLock`; change events are fanned out to
/// subscribers after the write completes.
pub struct MemoryStore {
    entities: RwLock<BTreeMap<EntityId, Entity>>,
    subscribers: RwLock<Vec<Sender<StoreEvent>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn emit(&self, event: StoreEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Returns true if the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, id: EntityId) -> StoreResult<Option<Entity>> {
        Ok(self.entities.read().get(&id).cloned())
    }

    fn list(&self) -> StoreResult<Vec<Entity>> {
        Ok(self.entities.read().values().cloned().collect())
    }

    fn upsert(&self, entity: Entity) -> StoreResult<()> {
        self.entities.write().insert(entity.id, entity.clone());
        self.emit(StoreEvent::Upserted(entity));
        Ok(())
    }

    fn delete(&self, id: EntityId) -> StoreResult<()> {
        if self.entities.write().remove(&id).is_some() {
            self.emit(StoreEvent::Deleted(id));
        }
        Ok(())
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }
}
