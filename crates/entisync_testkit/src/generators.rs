//! Property-based test generators using proptest.

use crate::fixtures::Avatar;
use entisync_core::{ActionKind, EntityId, OfflineAction, OwnerId, ViewMode};
use proptest::prelude::*;
use serde_json::json;

/// Strategy for entity IDs drawn from a small pool, so collisions happen.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    (0u8..8).prop_map(|n| EntityId::new(format!("e{n}")))
}

/// Strategy for owner IDs drawn from a small pool.
pub fn owner_id_strategy() -> impl Strategy<Value = OwnerId> {
    (0u8..3).prop_map(|n| OwnerId::new(format!("u{n}")))
}

/// Strategy for avatars.
pub fn avatar_strategy() -> impl Strategy<Value = Avatar> {
    (
        entity_id_strategy(),
        owner_id_strategy(),
        prop::string::string_regex("[A-Za-z]{1,12}").expect("Invalid regex"),
    )
        .prop_map(|(id, owner, name)| Avatar { id, owner, name })
}

/// Strategy for action kinds.
pub fn action_kind_strategy() -> impl Strategy<Value = ActionKind> {
    prop_oneof![
        Just(ActionKind::Like),
        Just(ActionKind::Comment),
        Just(ActionKind::Follow),
        Just(ActionKind::Create),
        Just(ActionKind::Update),
        Just(ActionKind::Delete),
    ]
}

/// Strategy for view modes.
pub fn view_mode_strategy() -> impl Strategy<Value = ViewMode> {
    prop_oneof![
        Just(ViewMode::Public),
        Just(ViewMode::Followers),
        Just(ViewMode::Private),
    ]
}

/// Strategy for offline actions that the scripted remote accepts
/// unconditionally (likes, comments and follows).
pub fn social_action_strategy() -> impl Strategy<Value = OfflineAction> {
    (
        prop_oneof![
            Just(ActionKind::Like),
            Just(ActionKind::Comment),
            Just(ActionKind::Follow),
        ],
        entity_id_strategy(),
        any::<u16>(),
    )
        .prop_map(|(kind, key, n)| OfflineAction::new(kind, key, json!({ "n": n })))
}

/// Strategy for arbitrary offline actions.
pub fn offline_action_strategy() -> impl Strategy<Value = OfflineAction> {
    (action_kind_strategy(), entity_id_strategy(), any::<i64>())
        .prop_map(|(kind, key, n)| OfflineAction::new(kind, key, json!({ "n": n })))
}
