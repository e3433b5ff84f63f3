//! Durable FIFO of offline actions.

use crate::error::SyncResult;
use crate::remote::RemoteStore;
use crate::retry::RetryExecutor;
use entisync_core::{Entity, EntityId, OfflineAction, RemoteError};
use entisync_storage::KvBackend;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reads and writes action lists in a key-value backend as JSON.
#[derive(Clone)]
pub struct ActionStore {
    backend: Arc<dyn KvBackend>,
}

impl ActionStore {
    /// Wraps a backend.
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Reads the list stored under `key`. A missing key is an empty list.
    pub fn read_list(&self, key: &str) -> SyncResult<Vec<OfflineAction>> {
        match self.backend.read(key)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replaces the list stored under `key`.
    pub fn write_list<'a, I>(&self, key: &str, actions: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = &'a OfflineAction>,
    {
        let actions: Vec<&OfflineAction> = actions.into_iter().collect();
        let bytes = serde_json::to_vec(&actions)?;
        self.backend.write(key, &bytes)?;
        Ok(())
    }
}

/// Why a drain stopped before emptying the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStopReason {
    /// The remote became unreachable.
    Offline,
    /// The head action was rejected permanently and left in place.
    Rejected,
    /// A transient failure outlasted the retry budget.
    Exhausted,
}

/// The action a drain stopped at.
#[derive(Debug, Clone)]
pub struct DrainStop {
    /// The head action, still queued.
    pub action: OfflineAction,
    /// The failure that stopped the drain.
    pub error: RemoteError,
    /// Attempts made for this action.
    pub attempts: u32,
    /// Why the drain stopped.
    pub reason: DrainStopReason,
}

/// Result of one drain pass.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
    /// Actions the remote accepted, in replay order.
    pub replayed: Vec<Uuid>,
    /// Actions the remote reported as already applied.
    pub already_applied: Vec<Uuid>,
    /// Set if the drain stopped with actions left.
    pub stopped: Option<DrainStop>,
    /// Queue length after the drain.
    pub remaining: usize,
}

impl DrainReport {
    /// Returns the rejected action blocking the queue, if any.
    pub fn halted(&self) -> Option<&DrainStop> {
        self.stopped
            .as_ref()
            .filter(|stop| stop.reason == DrainStopReason::Rejected)
    }

    /// Returns the number of actions removed from the queue.
    pub fn removed(&self) -> usize {
        self.replayed.len() + self.already_applied.len()
    }
}

/// Durable, strictly ordered queue of actions awaiting replay.
///
/// Every change is persisted before the call returns. The in-memory copy
/// is only updated once the write succeeds.
///
/// # Invariants
///
/// - Actions replay in enqueue order
/// - An action leaves the queue only after the remote accepted it
/// - At most one drain runs at a time
pub struct OfflineQueue {
    store: ActionStore,
    key: String,
    actions: Mutex<VecDeque<OfflineAction>>,
    drain_lock: tokio::sync::Mutex<()>,
}

impl OfflineQueue {
    /// Opens the queue persisted under `key`, loading any saved actions.
    pub fn open(store: ActionStore, key: impl Into<String>) -> SyncResult<Self> {
        let key = key.into();
        let actions: VecDeque<OfflineAction> = store.read_list(&key)?.into();
        if !actions.is_empty() {
            info!(key = %key, pending = actions.len(), "loaded offline queue");
        }
        Ok(Self {
            store,
            key,
            actions: Mutex::new(actions),
            drain_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Reloads the queue from storage, replacing the in-memory copy.
    pub fn load(&self) -> SyncResult<usize> {
        let loaded: VecDeque<OfflineAction> = self.store.read_list(&self.key)?.into();
        let len = loaded.len();
        *self.actions.lock() = loaded;
        Ok(len)
    }

    /// Appends an action and persists the queue.
    ///
    /// Returns the new queue length.
    pub fn enqueue(&self, action: OfflineAction) -> SyncResult<usize> {
        let mut actions = self.actions.lock();
        let id = action.id;
        let kind = action.kind;

        let mut next = actions.clone();
        next.push_back(action);
        self.store.write_list(&self.key, &next)?;
        *actions = next;

        debug!(action = %id, %kind, size = actions.len(), "queued offline action");
        Ok(actions.len())
    }

    /// Removes the head action without replaying it.
    pub fn discard_head(&self) -> SyncResult<Option<OfflineAction>> {
        let mut actions = self.actions.lock();
        let Some(head) = actions.front() else {
            return Ok(None);
        };
        let id = head.id;
        self.remove_locked(&mut actions, id)
    }

    /// Returns the queue length.
    pub fn size(&self) -> usize {
        self.actions.lock().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.actions.lock().is_empty()
    }

    /// Returns a copy of the queued actions in replay order.
    pub fn contents(&self) -> Vec<OfflineAction> {
        self.actions.lock().iter().cloned().collect()
    }

    /// Returns true if any queued action targets `key`.
    pub fn contains_key(&self, key: &EntityId) -> bool {
        self.actions.lock().iter().any(|action| &action.key == key)
    }

    /// Returns the head action.
    pub fn peek(&self) -> Option<OfflineAction> {
        self.actions.lock().front().cloned()
    }

    /// Replays queued actions in order until the queue is empty or an action
    /// cannot be delivered.
    ///
    /// Accepted and already-applied actions are removed and the remainder
    /// persisted before the next one is sent. A connectivity failure, a
    /// permanent rejection or an exhausted retry budget stops the drain with
    /// the head action still queued.
    pub async fn drain<E, R>(&self, remote: &R, retry: &RetryExecutor) -> SyncResult<DrainReport>
    where
        E: Entity,
        R: RemoteStore<E> + ?Sized,
    {
        let _drain = self.drain_lock.lock().await;
        let mut report = DrainReport::default();

        while let Some(action) = self.peek() {
            match retry.execute(|| remote.apply_action(&action)).await {
                Ok(()) => {
                    self.remove(action.id)?;
                    report.replayed.push(action.id);
                }
                Err(err) if err.last.is_already_applied() => {
                    debug!(action = %action.id, "action already applied remotely");
                    self.remove(action.id)?;
                    report.already_applied.push(action.id);
                }
                Err(err) => {
                    let reason = if err.last.category().is_connectivity() {
                        DrainStopReason::Offline
                    } else if err.last.is_retryable() {
                        DrainStopReason::Exhausted
                    } else {
                        DrainStopReason::Rejected
                    };
                    warn!(
                        action = %action.id,
                        kind = %action.kind,
                        ?reason,
                        error = %err.last,
                        "offline drain stopped"
                    );
                    report.stopped = Some(DrainStop {
                        action,
                        error: err.last,
                        attempts: err.attempts,
                        reason,
                    });
                    break;
                }
            }
        }

        report.remaining = self.size();
        if report.removed() > 0 {
            info!(
                replayed = report.replayed.len(),
                already_applied = report.already_applied.len(),
                remaining = report.remaining,
                "offline drain finished"
            );
        }
        Ok(report)
    }

    fn remove(&self, id: Uuid) -> SyncResult<Option<OfflineAction>> {
        let mut actions = self.actions.lock();
        self.remove_locked(&mut actions, id)
    }

    fn remove_locked(
        &self,
        actions: &mut VecDeque<OfflineAction>,
        id: Uuid,
    ) -> SyncResult<Option<OfflineAction>> {
        let Some(position) = actions.iter().position(|action| action.id == id) else {
            return Ok(None);
        };

        let mut next = actions.clone();
        let removed = next.remove(position);
        self.store.write_list(&self.key, &next)?;
        *actions = next;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entisync_core::{ActionKind, EntityId, OwnerId, RemoteResult};
    use entisync_storage::InMemoryBackend;
    use serde_json::json;

    #[derive(Debug, Clone)]
    struct Row {
        id: EntityId,
        owner: OwnerId,
    }

    impl Entity for Row {
        fn id(&self) -> &EntityId {
            &self.id
        }
        fn owner(&self) -> &OwnerId {
            &self.owner
        }
    }

    /// Records replayed actions and rejects those targeting `reject`.
    #[derive(Default)]
    struct Recorder {
        applied: Mutex<Vec<Uuid>>,
        reject: Option<EntityId>,
        duplicate: Option<EntityId>,
    }

    #[async_trait::async_trait]
    impl RemoteStore<Row> for Recorder {
        async fn fetch_by_owner(&self, _owner: &OwnerId) -> RemoteResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn fetch_many(&self, _ids: &[EntityId]) -> RemoteResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn update_entity(&self, _entity: &Row) -> RemoteResult<()> {
            Ok(())
        }

        async fn apply_action(&self, action: &OfflineAction) -> RemoteResult<()> {
            if self.reject.as_ref() == Some(&action.key) {
                return Err(RemoteError::authorization("permission denied"));
            }
            if self.duplicate.as_ref() == Some(&action.key) {
                return Err(RemoteError::already_applied("duplicate key"));
            }
            self.applied.lock().push(action.id);
            Ok(())
        }
    }

    fn queue() -> (Arc<InMemoryBackend>, OfflineQueue) {
        let backend = Arc::new(InMemoryBackend::new());
        let queue = OfflineQueue::open(ActionStore::new(backend.clone()), "queue").unwrap();
        (backend, queue)
    }

    fn action(key: &str) -> OfflineAction {
        OfflineAction::new(ActionKind::Like, key, json!({"by": "u1"}))
    }

    #[test]
    fn enqueue_persists_in_order() {
        let (backend, queue) = queue();
        let a = action("a");
        let b = action("b");
        assert_eq!(queue.enqueue(a.clone()).unwrap(), 1);
        assert_eq!(queue.enqueue(b.clone()).unwrap(), 2);

        let reopened = OfflineQueue::open(ActionStore::new(backend), "queue").unwrap();
        assert_eq!(reopened.contents(), vec![a, b]);
    }

    #[test]
    fn corrupt_queue_is_reported() {
        let backend = Arc::new(InMemoryBackend::with_value("queue", b"not json".to_vec()));
        let result = OfflineQueue::open(ActionStore::new(backend), "queue");
        assert!(matches!(result, Err(crate::SyncError::Serialization(_))));
    }

    #[test]
    fn discard_head_removes_first() {
        let (_, queue) = queue();
        let a = action("a");
        let b = action("b");
        queue.enqueue(a.clone()).unwrap();
        queue.enqueue(b.clone()).unwrap();

        assert_eq!(queue.discard_head().unwrap(), Some(a));
        assert_eq!(queue.contents(), vec![b]);
        queue.discard_head().unwrap();
        assert_eq!(queue.discard_head().unwrap(), None);
    }

    #[test]
    fn contains_key_tracks_queued_targets() {
        let (_, queue) = queue();
        queue.enqueue(action("a")).unwrap();
        assert!(queue.contains_key(&EntityId::new("a")));
        assert!(!queue.contains_key(&EntityId::new("b")));

        queue.discard_head().unwrap();
        assert!(!queue.contains_key(&EntityId::new("a")));
    }

    #[tokio::test]
    async fn drain_replays_in_order() {
        let (backend, queue) = queue();
        let ids: Vec<Uuid> = ["a", "b", "c"]
            .into_iter()
            .map(|key| {
                let action = action(key);
                let id = action.id;
                queue.enqueue(action).unwrap();
                id
            })
            .collect();

        let remote = Recorder::default();
        let report = queue
            .drain::<Row, _>(&remote, &RetryExecutor::new(Default::default()))
            .await
            .unwrap();

        assert_eq!(report.replayed, ids);
        assert_eq!(*remote.applied.lock(), ids);
        assert!(queue.is_empty());
        assert_eq!(report.remaining, 0);

        let reopened = OfflineQueue::open(ActionStore::new(backend), "queue").unwrap();
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn drain_halts_on_rejected_head() {
        let (_, queue) = queue();
        let rejected = action("locked");
        let later = action("b");
        queue.enqueue(rejected.clone()).unwrap();
        queue.enqueue(later.clone()).unwrap();

        let remote = Recorder {
            reject: Some("locked".into()),
            ..Default::default()
        };
        let report = queue
            .drain::<Row, _>(&remote, &RetryExecutor::new(Default::default()))
            .await
            .unwrap();

        let stop = report.halted().cloned().unwrap();
        assert_eq!(stop.action.id, rejected.id);
        assert_eq!(stop.attempts, 1);
        assert!(remote.applied.lock().is_empty());
        assert_eq!(queue.contents(), vec![rejected, later]);
    }

    #[tokio::test]
    async fn already_applied_counts_as_delivered() {
        let (_, queue) = queue();
        queue.enqueue(action("dup")).unwrap();
        queue.enqueue(action("b")).unwrap();

        let remote = Recorder {
            duplicate: Some("dup".into()),
            ..Default::default()
        };
        let report = queue
            .drain::<Row, _>(&remote, &RetryExecutor::new(Default::default()))
            .await
            .unwrap();

        assert_eq!(report.already_applied.len(), 1);
        assert_eq!(report.replayed.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn load_replaces_memory_copy() {
        let (backend, queue) = queue();
        let other = OfflineQueue::open(ActionStore::new(backend), "queue").unwrap();
        other.enqueue(action("x")).unwrap();

        assert_eq!(queue.size(), 0);
        assert_eq!(queue.load().unwrap(), 1);
        assert_eq!(queue.size(), 1);
    }
}
