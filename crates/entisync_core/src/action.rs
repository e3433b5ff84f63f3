//! Offline action records.

use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// The kind of mutation an offline action replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Like an entity.
    Like,
    /// Comment on an entity.
    Comment,
    /// Follow an owner.
    Follow,
    /// Create an entity.
    Create,
    /// Update an entity in place.
    Update,
    /// Delete an entity.
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Like => "like",
            ActionKind::Comment => "comment",
            ActionKind::Follow => "follow",
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A mutation recorded for later replay against the remote store.
///
/// Actions are persisted as an ordered list and never reordered. The `id`
/// identifies one enqueue; two actions with equal payloads are still
/// distinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineAction {
    /// Unique ID of this enqueue.
    pub id: Uuid,
    /// What the action does.
    pub kind: ActionKind,
    /// The entity the action targets.
    pub key: EntityId,
    /// Opaque action payload forwarded to the remote store.
    pub payload: serde_json::Value,
    /// Enqueue time in milliseconds since the Unix epoch.
    pub enqueued_at: u64,
}

impl OfflineAction {
    /// Creates an action stamped with the current time.
    pub fn new(kind: ActionKind, key: impl Into<EntityId>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            key: key.into(),
            payload,
            enqueued_at: unix_millis(),
        }
    }

    /// Overrides the enqueue time.
    #[must_use]
    pub fn with_enqueued_at(mut self, enqueued_at: u64) -> Self {
        self.enqueued_at = enqueued_at;
        self
    }
}

/// Milliseconds since the Unix epoch, or zero if the clock is before it.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
