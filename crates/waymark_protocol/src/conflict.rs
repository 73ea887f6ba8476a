//! Last-write-wins conflict resolution.

use crate::entity::Entity;

/// Which side of a conflict wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The local version is newer and is kept.
    FromLocal,
    /// The remote version wins and overwrites the local copy.
    FromRemote,
}

/// Resolves a conflict between a local and a remote version of the same
/// entity.
///
/// The version with the strictly greater `last_modified` wins. On exact
/// equality the remote version wins: the remote store is the convergence
/// point across devices, and preferring it makes a full sync pass
/// idempotent when there are no new writes.
///
/// The loser is discarded wholesale; there is no field-level merge.
#[must_use]
pub fn resolve(local: &Entity, remote: &Entity) -> Resolution {
    debug_assert_eq!(local.id, remote.id, "conflict resolution requires the same entity id");
    if local.last_modified > remote.last_modified {
        Resolution::FromLocal
    } else {
        Resolution::FromRemote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use chrono::{TimeZone, Utc};

    fn entity(id: EntityId, secs: i64) -> Entity {
        Entity::new(
            id,
            serde_json::json!({"at": secs}),
            Utc.timestamp_opt(secs, 0).unwrap(),
            None,
        )
    }

    #[test]
    fn newer_local_wins() {
        let id = EntityId::new();
        assert_eq!(
            resolve(&entity(id, 200), &entity(id, 100)),
            Resolution::FromLocal
        );
    }

    #[test]
    fn newer_remote_wins() {
        let id = EntityId::new();
        assert_eq!(
            resolve(&entity(id, 100), &entity(id, 200)),
            Resolution::FromRemote
        );
    }

    #[test]
    fn tie_goes_to_remote() {
        let id = EntityId::new();
        assert_eq!(
            resolve(&entity(id, 150), &entity(id, 150)),
            Resolution::FromRemote
        );
    }

    #[test]
    fn repeated_resolution_is_stable() {
        // Applying the winner again must keep producing the same answer.
        let id = EntityId::new();
        let local = entity(id, 100);
        let remote = entity(id, 150);
        assert_eq!(resolve(&local, &remote), Resolution::FromRemote);
        // After the remote version is installed locally, timestamps tie.
        assert_eq!(resolve(&remote, &remote), Resolution::FromRemote);
    }
}
