//! Events broadcast by the coordinator.

use crate::connectivity::ConnectivityState;
use crate::queue::DrainStopReason;
use entisync_core::{EntityId, OfflineAction, OperationId, OwnerId, RemoteError};
use std::fmt;

/// Lifecycle of one optimistic mutation.
///
/// ```text
/// Idle -> Snapshotting -> Mutated -> RemoteInFlight -> Committed
///                                                  \-> RolledBack
///                                                  \-> QueuedOffline
/// Idle -> QueuedOffline (offline before the attempt)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationState {
    /// Not started.
    Idle,
    /// Capturing the pre-mutation snapshot.
    Snapshotting,
    /// The optimistic change is visible locally.
    Mutated,
    /// Waiting on the remote, retries included.
    RemoteInFlight,
    /// The remote accepted the change.
    Committed,
    /// The remote rejected the change and local state was restored.
    RolledBack,
    /// The change was recorded for replay.
    QueuedOffline,
}

impl MutationState {
    /// Returns true for states a mutation never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MutationState::Committed | MutationState::RolledBack | MutationState::QueuedOffline
        )
    }
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationState::Idle => "idle",
            MutationState::Snapshotting => "snapshotting",
            MutationState::Mutated => "mutated",
            MutationState::RemoteInFlight => "remote_in_flight",
            MutationState::Committed => "committed",
            MutationState::RolledBack => "rolled_back",
            MutationState::QueuedOffline => "queued_offline",
        };
        f.write_str(name)
    }
}

/// Notifications for UI and host code.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The connectivity monitor observed a transition.
    ConnectivityChanged(ConnectivityState),
    /// A mutation moved to a new state.
    Mutation {
        /// The operation.
        operation: OperationId,
        /// The key it targets.
        key: EntityId,
        /// The state entered.
        state: MutationState,
    },
    /// A failed mutation could not be rolled back.
    RollbackFailed {
        /// The operation.
        operation: OperationId,
        /// The key it targets.
        key: EntityId,
        /// The remote failure.
        cause: RemoteError,
    },
    /// A drain removed actions from the offline queue.
    DrainFinished {
        /// Actions removed.
        removed: usize,
        /// Actions still queued.
        remaining: usize,
    },
    /// A drain stopped at an action that is still queued.
    DrainHalted {
        /// The head action.
        action: OfflineAction,
        /// The failure.
        error: RemoteError,
        /// Why the drain stopped.
        reason: DrainStopReason,
    },
    /// An operation exceeded the pending timeout.
    OperationTimedOut(OperationId),
    /// A forced reconciliation completed.
    Reconciled {
        /// The owner reconciled.
        owner: OwnerId,
        /// Entities overwritten from the remote.
        updated: usize,
        /// Local entities deleted.
        removed: usize,
    },
}
