//! Property tests for coalescing and conflict resolution.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use waymark_protocol::{resolve, CoalesceDecision, Entity, EntityId, OperationKind, Resolution};

fn kind_strategy() -> impl Strategy<Value = OperationKind> {
    prop_oneof![
        Just(OperationKind::Create),
        Just(OperationKind::Update),
        Just(OperationKind::Delete),
    ]
}

proptest! {
    /// A new delete is never silently dropped: it either replaces the
    /// pending entry or the pending entry is already a delete.
    #[test]
    fn delete_intent_is_never_lost(existing in kind_strategy()) {
        let decision = CoalesceDecision::for_kinds(existing, OperationKind::Delete);
        match decision {
            CoalesceDecision::ReplaceWithNew => {}
            CoalesceDecision::KeepExisting => prop_assert!(existing.is_delete()),
            CoalesceDecision::RejectReuseAfterDelete => {
                prop_assert!(false, "a delete must never be rejected")
            }
        }
    }

    /// The only rejected combinations are create/update after a pending
    /// delete.
    #[test]
    fn rejection_requires_pending_delete(
        existing in kind_strategy(),
        new in kind_strategy(),
    ) {
        let decision = CoalesceDecision::for_kinds(existing, new);
        if decision == CoalesceDecision::RejectReuseAfterDelete {
            prop_assert!(existing.is_delete());
            prop_assert!(!new.is_delete());
        }
    }

    /// Resolution is total and anti-symmetric except on ties, where both
    /// directions prefer the remote side.
    #[test]
    fn resolution_is_deterministic(a in 0i64..1_000_000, b in 0i64..1_000_000) {
        let id = EntityId::new();
        let local = Entity::new(id, serde_json::json!({}), Utc.timestamp_opt(a, 0).unwrap(), None);
        let remote = Entity::new(id, serde_json::json!({}), Utc.timestamp_opt(b, 0).unwrap(), None);

        let forward = resolve(&local, &remote);
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => prop_assert_eq!(forward, Resolution::FromLocal),
            _ => prop_assert_eq!(forward, Resolution::FromRemote),
        }
    }
}
