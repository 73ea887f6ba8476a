//! Synchronizable entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wall-clock timestamp used for last-write-wins comparison.
///
/// Always UTC; serialized as ISO-8601 on the wire and in the journal.
pub type Timestamp = DateTime<Utc>;

/// Unique identifier for an entity.
///
/// Entity IDs are UUIDs that are:
/// - Assigned at creation
/// - Immutable for the lifetime of the entity
/// - Never reused, even after deletion
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// A synchronizable domain record.
///
/// The engine treats `payload` as opaque: it is carried, stored and
/// compared for identity, never interpreted. The only field the sync
/// machinery reads is `last_modified`.
///
/// # Invariant
///
/// Every mutation, local or remote, must advance `last_modified` to a
/// value >= any previously observed value for the same id. The engine
/// trusts this; it does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Stable identifier, immutable after creation.
    pub id: EntityId,
    /// Domain fields, opaque to the sync engine.
    pub payload: serde_json::Value,
    /// Timestamp of the last mutation; sole conflict-resolution key.
    pub last_modified: Timestamp,
    /// Identity of the original author, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Entity {
    /// Creates a new entity.
    pub fn new(
        id: EntityId,
        payload: serde_json::Value,
        last_modified: Timestamp,
        created_by: Option<String>,
    ) -> Self {
        Self {
            id,
            payload,
            last_modified,
            created_by,
        }
    }

    /// Returns a copy with an updated payload and timestamp.
    #[must_use]
    pub fn with_update(&self, payload: serde_json::Value, last_modified: Timestamp) -> Self {
        Self {
            id: self.id,
            payload,
            last_modified,
            created_by: self.created_by.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn entity_id_roundtrips_through_uuid() {
        let id = EntityId::new();
        let uuid: Uuid = id.into();
        assert_eq!(EntityId::from(uuid), id);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn entity_serializes_iso8601_camel_case() {
        let entity = Entity::new(
            EntityId::new(),
            serde_json::json!({"name": "harbour"}),
            ts(1_700_000_000),
            Some("user-1".into()),
        );

        let json = serde_json::to_value(&entity).unwrap();
        assert!(json.get("lastModified").is_some());
        assert!(json.get("createdBy").is_some());
        let stamp = json["lastModified"].as_str().unwrap();
        assert!(stamp.contains('T'));
        assert!(stamp.ends_with('Z') || stamp.contains('+'));

        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn created_by_is_optional_on_the_wire() {
        let raw = serde_json::json!({
            "id": Uuid::new_v4(),
            "payload": {},
            "lastModified": "2024-01-01T00:00:00Z",
        });
        let entity: Entity = serde_json::from_value(raw).unwrap();
        assert_eq!(entity.created_by, None);
    }

    #[test]
    fn with_update_preserves_identity() {
        let entity = Entity::new(EntityId::new(), serde_json::json!(1), ts(100), None);
        let updated = entity.with_update(serde_json::json!(2), ts(200));
        assert_eq!(updated.id, entity.id);
        assert_eq!(updated.last_modified, ts(200));
        assert_eq!(updated.payload, serde_json::json!(2));
    }
}
