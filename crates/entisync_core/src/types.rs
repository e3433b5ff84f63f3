//! Core type definitions for EntiSync.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Stable identifier of an entity (the remote row key).
    EntityId
);

string_id!(
    /// Key of the owner an entity belongs to, used by the secondary index.
    OwnerId
);

string_id!(
    /// Identifier of one in-flight optimistic operation.
    OperationId
);

impl OperationId {
    /// Generates a fresh random operation ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Who may see or edit an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Visible to everyone.
    Public,
    /// Visible to the owner's followers.
    Followers,
    /// Visible to the owner only.
    Private,
}

/// A domain object mirrored by the sync layer.
///
/// The payload is opaque to EntiSync: only the ID and owner are ever read.
/// Applications typically implement this on a sum type over the entity kinds
/// they handle (avatars, posts, ...).
pub trait Entity: Clone + Send + Sync + 'static {
    /// Returns the entity's stable ID.
    fn id(&self) -> &EntityId;

    /// Returns the owner key used for the secondary index.
    fn owner(&self) -> &OwnerId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_and_compare() {
        let a = EntityId::new("avatar-1");
        let b: EntityId = "avatar-1".into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "avatar-1");
        assert_eq!(a.as_str(), "avatar-1");
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = OwnerId::new("user-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user-7\"");
    }

    #[test]
    fn generated_operation_ids_are_unique() {
        assert_ne!(OperationId::generate(), OperationId::generate());
    }

    #[test]
    fn view_mode_serde() {
        assert_eq!(
            serde_json::to_string(&ViewMode::Followers).unwrap(),
            "\"followers\""
        );
    }
}
