//! Remote store abstraction.

use async_trait::async_trait;
use entisync_core::{Entity, EntityId, OfflineAction, OwnerId, RemoteResult};

/// The authoritative store the coordinator synchronizes with.
///
/// This trait abstracts the network layer. Implementations classify every
/// failure into a [`RemoteError`](entisync_core::RemoteError) before
/// returning it; the engine never inspects raw messages.
///
/// Replayed [`OfflineAction`]s may be delivered more than once if the
/// process stops between a successful call and the queue being persisted.
/// Implementations that can detect a duplicate should answer with
/// [`RemoteError::already_applied`](entisync_core::RemoteError::already_applied).
#[async_trait]
pub trait RemoteStore<E: Entity>: Send + Sync {
    /// Fetches every entity belonging to `owner`.
    async fn fetch_by_owner(&self, owner: &OwnerId) -> RemoteResult<Vec<E>>;

    /// Fetches the entities with the given IDs. Missing IDs are omitted.
    async fn fetch_many(&self, ids: &[EntityId]) -> RemoteResult<Vec<E>>;

    /// Conditionally updates an existing entity.
    ///
    /// Fails with a not-found error if the row does not exist.
    async fn update_entity(&self, entity: &E) -> RemoteResult<()>;

    /// Applies one action, whether live or replayed from the offline queue.
    async fn apply_action(&self, action: &OfflineAction) -> RemoteResult<()>;
}
