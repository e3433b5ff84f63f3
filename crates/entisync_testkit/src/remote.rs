//! Scripted remote store.
//!
//! [`ScriptedRemote`] behaves like a small authoritative table of
//! [`Avatar`] rows. Tests script failures ahead of time and inspect the call
//! log afterwards.

use crate::fixtures::Avatar;
use async_trait::async_trait;
use entisync_core::{
    ActionKind, Entity, EntityId, OfflineAction, OwnerId, RemoteError, RemoteResult,
};
use entisync_engine::RemoteStore;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tokio::sync::watch;
use uuid::Uuid;

/// One call observed by [`ScriptedRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// `fetch_by_owner`.
    FetchByOwner(OwnerId),
    /// `fetch_many`.
    FetchMany(Vec<EntityId>),
    /// `update_entity`.
    UpdateEntity(EntityId),
    /// `apply_action`.
    ApplyAction {
        /// Action ID.
        id: Uuid,
        /// Action kind.
        kind: ActionKind,
        /// Target key.
        key: EntityId,
    },
}

impl RemoteCall {
    /// Returns the targeted key for single-key calls.
    pub fn key(&self) -> Option<&EntityId> {
        match self {
            RemoteCall::UpdateEntity(key) | RemoteCall::ApplyAction { key, .. } => Some(key),
            _ => None,
        }
    }
}

type CallMatcher = Box<dyn Fn(&RemoteCall) -> bool + Send + Sync>;

/// In-process remote store with scripted failures.
///
/// Failures are checked in this order on every call: the sticky outage set
/// with [`set_down`](Self::set_down), then the one-shot queue filled by
/// [`fail_next`](Self::fail_next), then per-key failures from
/// [`fail_key`](Self::fail_key), then matchers from
/// [`fail_matching`](Self::fail_matching).
pub struct ScriptedRemote {
    rows: Mutex<BTreeMap<EntityId, Avatar>>,
    script: Mutex<VecDeque<RemoteError>>,
    key_failures: Mutex<HashMap<EntityId, RemoteError>>,
    matchers: Mutex<Vec<(CallMatcher, RemoteError)>>,
    down: Mutex<Option<RemoteError>>,
    calls: Mutex<Vec<RemoteCall>>,
    applied: Mutex<Vec<OfflineAction>>,
    applied_ids: Mutex<HashSet<Uuid>>,
    paused: watch::Sender<bool>,
}

impl ScriptedRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            rows: Mutex::new(BTreeMap::new()),
            script: Mutex::new(VecDeque::new()),
            key_failures: Mutex::new(HashMap::new()),
            matchers: Mutex::new(Vec::new()),
            down: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            applied: Mutex::new(Vec::new()),
            applied_ids: Mutex::new(HashSet::new()),
            paused,
        }
    }

    /// Creates a remote holding `rows`.
    pub fn with_rows(rows: impl IntoIterator<Item = Avatar>) -> Self {
        let remote = Self::new();
        for row in rows {
            remote.insert_row(row);
        }
        remote
    }

    /// Inserts or replaces a row without recording a call.
    pub fn insert_row(&self, row: Avatar) {
        self.rows.lock().insert(row.id.clone(), row);
    }

    /// Deletes a row without recording a call.
    pub fn delete_row(&self, id: &str) -> Option<Avatar> {
        self.rows.lock().remove(&EntityId::new(id))
    }

    /// Returns a row.
    pub fn row(&self, id: &str) -> Option<Avatar> {
        self.rows.lock().get(&EntityId::new(id)).cloned()
    }

    /// Returns every row ordered by ID.
    pub fn rows(&self) -> Vec<Avatar> {
        self.rows.lock().values().cloned().collect()
    }

    /// Fails the next call with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.script.lock().push_back(error);
    }

    /// Fails the next `n` calls with `error`.
    pub fn fail_next_n(&self, n: usize, error: RemoteError) {
        let mut script = self.script.lock();
        for _ in 0..n {
            script.push_back(error.clone());
        }
    }

    /// Fails every update or action targeting `key` until cleared.
    pub fn fail_key(&self, key: &str, error: RemoteError) {
        self.key_failures.lock().insert(EntityId::new(key), error);
    }

    /// Clears a per-key failure.
    pub fn clear_key_failure(&self, key: &str) {
        self.key_failures.lock().remove(&EntityId::new(key));
    }

    /// Fails every call accepted by `matcher` with `error`.
    pub fn fail_matching<F>(&self, matcher: F, error: RemoteError)
    where
        F: Fn(&RemoteCall) -> bool + Send + Sync + 'static,
    {
        self.matchers.lock().push((Box::new(matcher), error));
    }

    /// Fails every call with `error` until set back to `None`.
    pub fn set_down(&self, error: Option<RemoteError>) {
        *self.down.lock() = error;
    }

    /// Holds every call after it is logged until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Releases held calls.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Returns the call log.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the number of calls that targeted `key`.
    pub fn calls_for(&self, key: &str) -> usize {
        let key = EntityId::new(key);
        self.calls
            .lock()
            .iter()
            .filter(|call| call.key() == Some(&key))
            .count()
    }

    /// Returns the actions applied successfully, in order.
    pub fn applied_actions(&self) -> Vec<OfflineAction> {
        self.applied.lock().clone()
    }

    async fn enter(&self, call: RemoteCall) -> RemoteResult<()> {
        let key = call.key().cloned();
        let matched = self
            .matchers
            .lock()
            .iter()
            .find(|(matcher, _)| matcher(&call))
            .map(|(_, error)| error.clone());
        self.calls.lock().push(call);

        let mut paused = self.paused.subscribe();
        while *paused.borrow_and_update() {
            if paused.changed().await.is_err() {
                break;
            }
        }

        if let Some(error) = self.down.lock().clone() {
            return Err(error);
        }
        if let Some(error) = self.script.lock().pop_front() {
            return Err(error);
        }
        if let Some(error) = key.and_then(|key| self.key_failures.lock().get(&key).cloned()) {
            return Err(error);
        }
        match matched {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn update_row(&self, avatar: Avatar) -> RemoteResult<()> {
        let mut rows = self.rows.lock();
        match rows.get_mut(&avatar.id) {
            Some(row) => {
                *row = avatar;
                Ok(())
            }
            None => Err(RemoteError::not_found(format!("avatar {} not found", avatar.id))),
        }
    }

    fn apply(&self, action: &OfflineAction) -> RemoteResult<()> {
        let entity = action.payload.get("entity").unwrap_or(&action.payload);
        let avatar: Option<Avatar> = serde_json::from_value(entity.clone()).ok();

        match action.kind {
            ActionKind::Create => {
                let avatar = avatar
                    .ok_or_else(|| RemoteError::validation("create payload is not an avatar"))?;
                let mut rows = self.rows.lock();
                if rows.contains_key(&avatar.id) {
                    return Err(RemoteError::conflict("duplicate key value"));
                }
                rows.insert(avatar.id.clone(), avatar);
            }
            ActionKind::Update => match avatar {
                Some(avatar) => self.update_row(avatar)?,
                None if self.rows.lock().contains_key(&action.key) => {}
                None => {
                    return Err(RemoteError::not_found(format!("avatar {} not found", action.key)))
                }
            },
            ActionKind::Delete => {
                if self.rows.lock().remove(&action.key).is_none() {
                    return Err(RemoteError::not_found(format!("avatar {} not found", action.key)));
                }
            }
            ActionKind::Like | ActionKind::Comment | ActionKind::Follow => {}
        }
        Ok(())
    }
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore<Avatar> for ScriptedRemote {
    async fn fetch_by_owner(&self, owner: &OwnerId) -> RemoteResult<Vec<Avatar>> {
        self.enter(RemoteCall::FetchByOwner(owner.clone())).await?;
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|row| row.owner() == owner)
            .cloned()
            .collect())
    }

    async fn fetch_many(&self, ids: &[EntityId]) -> RemoteResult<Vec<Avatar>> {
        self.enter(RemoteCall::FetchMany(ids.to_vec())).await?;
        let rows = self.rows.lock();
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn update_entity(&self, entity: &Avatar) -> RemoteResult<()> {
        self.enter(RemoteCall::UpdateEntity(entity.id().clone()))
            .await?;
        self.update_row(entity.clone())
    }

    async fn apply_action(&self, action: &OfflineAction) -> RemoteResult<()> {
        self.enter(RemoteCall::ApplyAction {
            id: action.id,
            kind: action.kind,
            key: action.key.clone(),
        })
        .await?;

        if self.applied_ids.lock().contains(&action.id) {
            return Err(RemoteError::already_applied(format!(
                "action {} already applied",
                action.id
            )));
        }
        self.apply(action)?;
        self.applied_ids.lock().insert(action.id);
        self.applied.lock().push(action.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::avatar;
    use serde_json::json;

    #[tokio::test]
    async fn scripted_failures_in_order() {
        let remote = ScriptedRemote::with_rows([avatar("a1", "u1", "Ada")]);
        remote.fail_next(RemoteError::connectivity("timeout"));

        let owner = OwnerId::new("u1");
        assert!(remote.fetch_by_owner(&owner).await.is_err());
        assert_eq!(remote.fetch_by_owner(&owner).await.unwrap().len(), 1);
        assert_eq!(remote.call_count(), 2);
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let remote = ScriptedRemote::new();
        let err = remote
            .update_entity(&avatar("ghost", "u1", "Boo"))
            .await
            .unwrap_err();
        assert_eq!(err.category(), entisync_core::ErrorCategory::NotFound);
    }

    #[tokio::test]
    async fn duplicate_action_reports_already_applied() {
        let remote = ScriptedRemote::new();
        let action = OfflineAction::new(ActionKind::Like, "post", json!({}));

        remote.apply_action(&action).await.unwrap();
        let err = remote.apply_action(&action).await.unwrap_err();
        assert!(err.is_already_applied());
        assert_eq!(remote.applied_actions().len(), 1);
    }

    #[tokio::test]
    async fn create_then_delete() {
        let remote = ScriptedRemote::new();
        let row = avatar("a1", "u1", "Ada");
        let create = OfflineAction::new(
            ActionKind::Create,
            "a1",
            serde_json::to_value(&row).unwrap(),
        );
        remote.apply_action(&create).await.unwrap();
        assert_eq!(remote.row("a1"), Some(row));

        let delete = OfflineAction::new(ActionKind::Delete, "a1", json!(null));
        remote.apply_action(&delete).await.unwrap();
        assert_eq!(remote.row("a1"), None);
    }
}
