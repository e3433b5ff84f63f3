//! Optimistic mutation coordinator.

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityState, SubscriptionId};
use crate::error::{SyncError, SyncResult};
use crate::events::{MutationState, SyncEvent};
use crate::locks::KeyLocks;
use crate::queue::{ActionStore, DrainReport, DrainStopReason, OfflineQueue};
use crate::remote::RemoteStore;
use crate::retry::{RetryError, RetryExecutor};
use entisync_core::{
    ActionKind, Entity, EntityId, EntityStore, EntryMut, OfflineAction, OperationId, OwnerId,
    PendingOperations, RemoteError, RemoteResult, SnapshotManager, SnapshotResult,
    SnapshotTimestamp, StoreView, ViewMode,
};
use entisync_storage::KvBackend;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

type ApplyFn<E> = Box<dyn FnOnce(EntryMut<'_, E>) + Send>;

/// How a mutation ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The remote accepted the change.
    Committed,
    /// The change was recorded for replay once connectivity returns.
    QueuedOffline,
}

/// A generic optimistic mutation.
///
/// `apply` runs once the pre-mutation snapshot is taken and only sees the
/// entry for `action.key`, so a rollback restores everything it changed.
/// The remote call is [`RemoteStore::apply_action`] with `action`, which is
/// also what gets queued while offline.
pub struct MutationRequest<E> {
    operation: Option<OperationId>,
    action: OfflineAction,
    apply: ApplyFn<E>,
}

impl<E: Entity> MutationRequest<E> {
    /// Creates a request targeting `action.key`.
    pub fn new<F>(action: OfflineAction, apply: F) -> Self
    where
        F: FnOnce(EntryMut<'_, E>) + Send + 'static,
    {
        Self {
            operation: None,
            action,
            apply: Box::new(apply),
        }
    }

    /// Uses a caller-chosen operation ID instead of a generated one.
    pub fn with_operation_id(mut self, operation: impl Into<OperationId>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Returns the targeted key.
    pub fn key(&self) -> &EntityId {
        &self.action.key
    }

    /// Returns the action sent to the remote.
    pub fn action(&self) -> &OfflineAction {
        &self.action
    }
}

impl<E> fmt::Debug for MutationRequest<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationRequest")
            .field("operation", &self.operation)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Counters describing coordinator activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Mutations the remote accepted.
    pub mutations_committed: u64,
    /// Mutations rolled back after a remote rejection.
    pub mutations_rolled_back: u64,
    /// Mutations whose rollback failed.
    pub rollback_failures: u64,
    /// Mutations handed to the offline queue.
    pub mutations_queued: u64,
    /// Offline actions removed by drains.
    pub actions_replayed: u64,
    /// Drains that stopped at a rejected action.
    pub drains_halted: u64,
    /// Successful forced reconciliations.
    pub reconciliations: u64,
    /// Operations reported by the pending sweep.
    pub operations_timed_out: u64,
    /// Retries scheduled by the retry executor.
    pub retries: u64,
    /// Time of the last successful reconciliation.
    pub last_reconciled: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a forced reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entities overwritten with the remote value.
    pub updated: usize,
    /// Local entities deleted because the remote no longer has them.
    pub removed: usize,
}

struct LocalState<E> {
    store: EntityStore<E>,
    snapshots: SnapshotManager<E>,
}

/// Background tasks started by [`SyncCoordinator::start`].
///
/// Dropping the handle stops the tasks.
pub struct SyncTasks {
    monitor: Arc<ConnectivityMonitor>,
    subscription: Option<SubscriptionId>,
    handles: Vec<JoinHandle<()>>,
}

impl SyncTasks {
    /// Stops the probe loop, the pending sweep and the replay listener.
    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Returns true while every task is still running.
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && self.handles.iter().all(|handle| !handle.is_finished())
    }

    fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.monitor.unsubscribe(subscription);
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for SyncTasks {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for SyncTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncTasks")
            .field("tasks", &self.handles.len())
            .finish()
    }
}

/// Keeps a local entity mirror consistent with a remote store.
///
/// Every mutation is applied locally first and confirmed remotely through
/// the retry executor. A rejected mutation restores the snapshot it took;
/// an unreachable remote sends it to the offline queue, which drains on the
/// next transition to online.
///
/// # Invariants
///
/// - At most one mutation per key is in flight
/// - A mutation only ever restores or discards its own snapshot
/// - No lock on local state is held across an await
/// - Forced reconciliation never overlaps a mutation
pub struct SyncCoordinator<E: Entity, R: RemoteStore<E>> {
    config: SyncConfig,
    remote: Arc<R>,
    local: Mutex<LocalState<E>>,
    pending: Mutex<PendingOperations>,
    retry: RetryExecutor,
    queue: OfflineQueue,
    monitor: Arc<ConnectivityMonitor>,
    key_locks: KeyLocks,
    gate: tokio::sync::RwLock<()>,
    events: broadcast::Sender<SyncEvent>,
    stats: RwLock<SyncStats>,
}

impl<E: Entity, R: RemoteStore<E>> SyncCoordinator<E, R> {
    /// Creates a coordinator and loads the persisted offline queue.
    pub fn new(
        config: SyncConfig,
        remote: Arc<R>,
        storage: Arc<dyn KvBackend>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> SyncResult<Self> {
        let queue = OfflineQueue::open(ActionStore::new(storage), config.queue_key.clone())?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Ok(Self {
            local: Mutex::new(LocalState {
                store: EntityStore::new(),
                snapshots: SnapshotManager::new(config.snapshot_capacity),
            }),
            pending: Mutex::new(PendingOperations::new(config.pending_timeout)),
            retry: RetryExecutor::new(config.retry.clone()),
            queue,
            monitor,
            remote,
            key_locks: KeyLocks::new(),
            gate: tokio::sync::RwLock::new(()),
            events,
            stats: RwLock::new(SyncStats::default()),
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the remote store.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Returns the connectivity monitor.
    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    /// Returns the offline queue.
    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Returns activity counters.
    pub fn stats(&self) -> SyncStats {
        let mut stats = self.stats.read().clone();
        stats.retries = self.retry.retries();
        stats
    }

    /// Subscribes to coordinator events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Returns the local value of an entity.
    pub fn get(&self, id: &EntityId) -> Option<E> {
        self.local.lock().store.get(id).cloned()
    }

    /// Returns the active entity.
    pub fn active(&self) -> Option<E> {
        self.local.lock().store.active().cloned()
    }

    /// Returns the view mode of an entity, if annotated.
    pub fn view_mode(&self, id: &EntityId) -> Option<ViewMode> {
        self.local.lock().store.view_mode(id)
    }

    /// Returns the local entities belonging to `owner`.
    pub fn owned_by(&self, owner: &OwnerId) -> Vec<E> {
        self.local
            .lock()
            .store
            .owned_by(owner)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns a copy of the local store.
    pub fn store_view(&self) -> StoreView<E> {
        self.local.lock().store.snapshot_view()
    }

    /// Returns the number of operations awaiting the remote.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if the operation is awaiting the remote.
    pub fn is_pending(&self, operation: &OperationId) -> bool {
        self.pending.lock().is_pending(operation)
    }

    /// Returns the retained snapshot timestamps, oldest first.
    pub fn snapshot_timestamps(&self) -> Vec<SnapshotTimestamp> {
        self.local.lock().snapshots.timestamps()
    }

    /// Restores the newest retained snapshot.
    pub fn rollback_to_last(&self) -> SnapshotResult<SnapshotTimestamp> {
        let mut local = self.local.lock();
        let LocalState { store, snapshots } = &mut *local;
        snapshots.rollback_to_last(store)
    }

    /// Restores the snapshot taken at `timestamp`, discarding newer ones.
    pub fn rollback_to(&self, timestamp: SnapshotTimestamp) -> SnapshotResult<()> {
        let mut local = self.local.lock();
        let LocalState { store, snapshots } = &mut *local;
        snapshots.rollback_to(store, timestamp)
    }

    /// Drops all snapshot history.
    ///
    /// In-flight mutations that fail afterwards report
    /// [`SyncError::MutationRollbackFailed`].
    pub fn clear_snapshots(&self) {
        self.local.lock().snapshots.clear();
    }

    /// Runs a generic optimistic mutation.
    pub async fn mutate(&self, request: MutationRequest<E>) -> SyncResult<MutationOutcome> {
        let MutationRequest {
            operation,
            action,
            apply,
        } = request;
        let sent = action.clone();
        self.run_mutation(operation, action, apply, || self.remote.apply_action(&sent))
            .await
    }

    /// Deletes an entity.
    pub async fn delete_entity(&self, id: EntityId) -> SyncResult<MutationOutcome> {
        let action = OfflineAction::new(ActionKind::Delete, id, serde_json::Value::Null);
        self.mutate(MutationRequest::<E>::new(action, |mut entry| {
            entry.remove();
        }))
        .await
    }

    /// Fetches every entity of `owner` and merges it into the local store.
    ///
    /// Keys with a mutation in flight keep their optimistic value.
    pub async fn fetch_owner(&self, owner: &OwnerId) -> SyncResult<Vec<E>> {
        let entities = self
            .retry
            .execute(|| self.remote.fetch_by_owner(owner))
            .await
            .map_err(|err| self.read_failed(err))?;

        let mut merged = 0usize;
        {
            let mut local = self.local.lock();
            for entity in &entities {
                if self.key_locks.is_busy(entity.id()) {
                    continue;
                }
                local.store.set(entity.clone());
                merged += 1;
            }
        }
        debug!(%owner, fetched = entities.len(), merged, "fetched owner entities");
        Ok(entities)
    }

    /// Replaces local state for `owner` with the remote's.
    ///
    /// Waits for in-flight mutations and blocks new ones until done. Local
    /// entities missing from the owner's remote set are confirmed with
    /// [`RemoteStore::fetch_many`]; those still absent are deleted. Any
    /// failure restores the state captured at the start.
    pub async fn force_sync(&self, owner: &OwnerId) -> SyncResult<ReconcileReport> {
        let _gate = self.gate.write().await;
        let snapshot = {
            let mut local = self.local.lock();
            let LocalState { store, snapshots } = &mut *local;
            snapshots.capture(store)
        };
        info!(%owner, %snapshot, "reconciling with remote");

        match self.reconcile(owner).await {
            Ok(report) => {
                self.local.lock().snapshots.discard(snapshot);
                {
                    let mut stats = self.stats.write();
                    stats.reconciliations += 1;
                    stats.last_reconciled = Some(Instant::now());
                }
                info!(%owner, updated = report.updated, removed = report.removed, "reconciled");
                self.emit(SyncEvent::Reconciled {
                    owner: owner.clone(),
                    updated: report.updated,
                    removed: report.removed,
                });
                Ok(report)
            }
            Err(err) => {
                let restored = self.rollback_to(snapshot).is_ok();
                if restored {
                    warn!(%owner, error = %err.last, "reconciliation failed, local state restored");
                } else {
                    error!(
                        %owner,
                        error = %err.last,
                        "reconciliation failed and could not be undone"
                    );
                }
                self.note_remote_failure(&err.last);
                Err(SyncError::ReconciliationFailed {
                    cause: err.last,
                    restored,
                })
            }
        }
    }

    /// Replays the offline queue now.
    pub async fn drain_offline_queue(&self) -> SyncResult<DrainReport> {
        let report = self
            .queue
            .drain::<E, R>(self.remote.as_ref(), &self.retry)
            .await?;

        let removed = report.removed();
        if removed > 0 {
            self.stats.write().actions_replayed += removed as u64;
            self.emit(SyncEvent::DrainFinished {
                removed,
                remaining: report.remaining,
            });
        }
        if let Some(stop) = &report.stopped {
            match stop.reason {
                DrainStopReason::Offline => {
                    self.monitor.set_state(ConnectivityState::Offline);
                }
                DrainStopReason::Rejected => {
                    self.stats.write().drains_halted += 1;
                }
                DrainStopReason::Exhausted => {}
            }
            self.note_remote_failure(&stop.error);
            self.emit(SyncEvent::DrainHalted {
                action: stop.action.clone(),
                error: stop.error.clone(),
                reason: stop.reason,
            });
        }
        Ok(report)
    }

    /// Reports and forgets operations older than the pending timeout.
    pub fn sweep_pending(&self) -> Vec<OperationId> {
        let expired = self.pending.lock().sweep(now());
        if !expired.is_empty() {
            self.stats.write().operations_timed_out += expired.len() as u64;
        }
        for operation in &expired {
            warn!(%operation, timeout = ?self.config.pending_timeout, "operation timed out");
            self.emit(SyncEvent::OperationTimedOut(operation.clone()));
        }
        expired
    }

    async fn run_mutation<F, Fut, T>(
        &self,
        operation: Option<OperationId>,
        action: OfflineAction,
        apply: ApplyFn<E>,
        remote_call: F,
    ) -> SyncResult<MutationOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let operation = operation.unwrap_or_else(OperationId::generate);
        let key = action.key.clone();

        let _gate = self.gate.read().await;
        let _key_guard = self.key_locks.lock(&key).await;

        // Older actions for this key must reach the remote first.
        if self.monitor.is_online() && self.queue.contains_key(&key) {
            debug!(%operation, %key, "draining queued actions for key first");
            self.drain_offline_queue().await?;
        }
        if !self.monitor.is_online() {
            debug!(%operation, %key, "offline, queueing without remote attempt");
            return self.queue_offline(&operation, action);
        }
        if self.queue.contains_key(&key) {
            debug!(%operation, %key, "key still has queued actions, queueing behind them");
            return self.queue_offline(&operation, action);
        }

        if !self.pending.lock().register(operation.clone(), now()) {
            return Err(SyncError::DuplicateOperation(operation));
        }

        self.transition(&operation, &key, MutationState::Snapshotting);
        let snapshot = {
            let mut local = self.local.lock();
            let LocalState { store, snapshots } = &mut *local;
            let snapshot = snapshots.capture(store);
            apply(store.entry_mut(key.clone()));
            snapshot
        };
        self.transition(&operation, &key, MutationState::Mutated);
        self.transition(&operation, &key, MutationState::RemoteInFlight);

        let result = self.retry.execute(remote_call).await;

        let cause = match result {
            Ok(_) => {
                self.pending.lock().complete(&operation);
                if !self.local.lock().snapshots.discard(snapshot) {
                    debug!(%operation, %snapshot, "snapshot already gone at commit");
                }
                self.stats.write().mutations_committed += 1;
                self.transition(&operation, &key, MutationState::Committed);
                return Ok(MutationOutcome::Committed);
            }
            Err(err) => {
                self.pending.lock().fail(&operation);
                err.last
            }
        };

        self.note_remote_failure(&cause);
        let restored = self.restore_own_snapshot(&key, snapshot);
        if !restored {
            self.rollback_failed(&operation, &key, &cause);
        }

        if cause.category().is_connectivity() {
            self.monitor.set_state(ConnectivityState::Offline);
            self.queue.enqueue(action)?;
            self.stats.write().mutations_queued += 1;
            if !restored {
                return Err(SyncError::MutationRollbackFailed { cause });
            }
            self.transition(&operation, &key, MutationState::QueuedOffline);
            return Ok(MutationOutcome::QueuedOffline);
        }

        if !restored {
            return Err(SyncError::MutationRollbackFailed { cause });
        }
        self.stats.write().mutations_rolled_back += 1;
        self.transition(&operation, &key, MutationState::RolledBack);
        Err(SyncError::MutationRolledBack { cause })
    }

    fn queue_offline(
        &self,
        operation: &OperationId,
        action: OfflineAction,
    ) -> SyncResult<MutationOutcome> {
        let key = action.key.clone();
        self.queue.enqueue(action)?;
        self.stats.write().mutations_queued += 1;
        self.transition(operation, &key, MutationState::QueuedOffline);
        Ok(MutationOutcome::QueuedOffline)
    }

    fn restore_own_snapshot(&self, key: &EntityId, snapshot: SnapshotTimestamp) -> bool {
        let mut local = self.local.lock();
        match local.snapshots.take(snapshot) {
            Some(taken) => {
                local.store.restore_entry(key, taken.view());
                debug!(%key, %snapshot, "rolled back optimistic change");
                true
            }
            None => false,
        }
    }

    fn rollback_failed(&self, operation: &OperationId, key: &EntityId, cause: &RemoteError) {
        error!(
            %operation,
            %key,
            error = %cause,
            "mutation failed and its snapshot is gone; local state may diverge"
        );
        self.stats.write().rollback_failures += 1;
        self.emit(SyncEvent::RollbackFailed {
            operation: operation.clone(),
            key: key.clone(),
            cause: cause.clone(),
        });
    }

    async fn reconcile(&self, owner: &OwnerId) -> Result<ReconcileReport, RetryError> {
        let remote_set = self
            .retry
            .execute(|| self.remote.fetch_by_owner(owner))
            .await?;

        let mut report = ReconcileReport::default();
        let remote_ids: HashSet<EntityId> =
            remote_set.iter().map(|entity| entity.id().clone()).collect();
        let missing: Vec<EntityId> = {
            let mut local = self.local.lock();
            for entity in remote_set {
                local.store.set(entity);
                report.updated += 1;
            }
            let owned = local.store.ids_owned_by(owner);
            owned
                .into_iter()
                .filter(|id| !remote_ids.contains(id))
                .collect()
        };
        if missing.is_empty() {
            return Ok(report);
        }

        let found = self
            .retry
            .execute(|| self.remote.fetch_many(&missing))
            .await?;

        let mut local = self.local.lock();
        let found_ids: HashSet<EntityId> = found.iter().map(|entity| entity.id().clone()).collect();
        for entity in found {
            local.store.set(entity);
            report.updated += 1;
        }
        for id in missing.iter().filter(|id| !found_ids.contains(*id)) {
            local.store.remove(id);
            report.removed += 1;
        }
        Ok(report)
    }

    fn read_failed(&self, err: RetryError) -> SyncError {
        self.note_remote_failure(&err.last);
        if err.last.category().is_connectivity() {
            self.monitor.set_state(ConnectivityState::Offline);
        }
        SyncError::RetryExhausted {
            attempts: err.attempts,
            cause: err.last,
        }
    }

    fn note_remote_failure(&self, cause: &RemoteError) {
        self.stats.write().last_error = Some(cause.to_string());
    }

    fn transition(&self, operation: &OperationId, key: &EntityId, state: MutationState) {
        debug!(%operation, %key, %state, "mutation state");
        self.emit(SyncEvent::Mutation {
            operation: operation.clone(),
            key: key.clone(),
            state,
        });
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is not an error.
        let _ = self.events.send(event);
    }
}

impl<E, R> SyncCoordinator<E, R>
where
    E: Entity + Serialize,
    R: RemoteStore<E>,
{
    /// Creates an entity.
    pub async fn create_entity(&self, entity: E) -> SyncResult<MutationOutcome> {
        let action = OfflineAction::new(
            ActionKind::Create,
            entity.id().clone(),
            serde_json::to_value(&entity)?,
        );
        self.mutate(MutationRequest::<E>::new(action, move |mut entry| {
            entry.set(entity);
        }))
        .await
    }

    /// Updates an existing entity.
    ///
    /// The live call is [`RemoteStore::update_entity`]; the queued action is
    /// an `Update` carrying the serialized entity.
    pub async fn update_entity(&self, entity: E) -> SyncResult<MutationOutcome> {
        let action = OfflineAction::new(
            ActionKind::Update,
            entity.id().clone(),
            serde_json::to_value(&entity)?,
        );
        let optimistic = entity.clone();
        let MutationRequest { action, apply, .. } =
            MutationRequest::<E>::new(action, move |mut entry| {
                entry.set(optimistic);
            });
        self.run_mutation(None, action, apply, || self.remote.update_entity(&entity))
            .await
    }

    /// Makes `entity` the active selection.
    pub async fn set_active(&self, entity: E) -> SyncResult<MutationOutcome> {
        let payload = serde_json::json!({
            "entity": serde_json::to_value(&entity)?,
            "active": true,
        });
        let action = OfflineAction::new(ActionKind::Update, entity.id().clone(), payload);
        self.mutate(MutationRequest::<E>::new(action, move |mut entry| {
            entry.set_active(entity);
        }))
        .await
    }

    /// Changes who may see an entity.
    pub async fn set_view_mode(&self, id: EntityId, mode: ViewMode) -> SyncResult<MutationOutcome> {
        let payload = serde_json::json!({ "view_mode": mode });
        let action = OfflineAction::new(ActionKind::Update, id, payload);
        self.mutate(MutationRequest::<E>::new(action, move |mut entry| {
            entry.set_view_mode(mode);
        }))
        .await
    }
}

impl<E, R> SyncCoordinator<E, R>
where
    E: Entity,
    R: RemoteStore<E> + 'static,
{
    /// Spawns the connectivity probe loop, the pending sweep and the replay
    /// listener.
    ///
    /// Each transition to online drains the offline queue. A queue loaded
    /// from storage is drained right away if the monitor reports online.
    pub fn start(self: &Arc<Self>) -> SyncTasks {
        let (trigger, mut triggered) = mpsc::unbounded_channel::<()>();

        let subscription = {
            let events = self.events.clone();
            let trigger = trigger.clone();
            self.monitor.subscribe(move |state| {
                let _ = events.send(SyncEvent::ConnectivityChanged(state));
                if state.is_online() {
                    let _ = trigger.send(());
                }
            })
        };

        let replay = {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                while triggered.recv().await.is_some() {
                    if let Err(err) = coordinator.drain_offline_queue().await {
                        error!(error = %err, "offline replay failed");
                    }
                }
            })
        };

        let sweep = {
            let coordinator = Arc::clone(self);
            let period = self.config.sweep_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    coordinator.sweep_pending();
                }
            })
        };

        let probe = self.monitor.start();

        if self.monitor.is_online() && !self.queue.is_empty() {
            let _ = trigger.send(());
        }
        info!(pending = self.queue.size(), "sync tasks started");

        SyncTasks {
            monitor: Arc::clone(&self.monitor),
            subscription: Some(subscription),
            handles: vec![probe, sweep, replay],
        }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
