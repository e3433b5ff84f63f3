//! Error types for the sync engine.

use entisync_core::{ErrorCategory, OperationId, RemoteError};
use entisync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the sync coordinator.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote rejected the mutation and local state was restored.
    #[error("mutation rolled back: {cause}")]
    MutationRolledBack {
        /// The remote failure.
        cause: RemoteError,
    },

    /// The remote rejected the mutation and its snapshot was gone.
    ///
    /// Local state may still hold the optimistic value; a
    /// [`force_sync`](crate::SyncCoordinator::force_sync) is advised.
    #[error("mutation failed and could not be rolled back: {cause}")]
    MutationRollbackFailed {
        /// The remote failure.
        cause: RemoteError,
    },

    /// A remote read failed after the retry budget.
    #[error("remote call failed after {attempts} attempt(s): {cause}")]
    RetryExhausted {
        /// Attempts made.
        attempts: u32,
        /// The last failure.
        cause: RemoteError,
    },

    /// Reconciliation against the remote failed.
    #[error("reconciliation failed (local state restored: {restored}): {cause}")]
    ReconciliationFailed {
        /// The remote failure.
        cause: RemoteError,
        /// Whether the pre-reconciliation state was restored.
        restored: bool,
    },

    /// The operation ID is already in flight.
    #[error("operation {0} is already pending")]
    DuplicateOperation(OperationId),

    /// Persistent storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The persisted offline queue could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Returns the remote failure category, if this error came from the remote.
    pub fn category(&self) -> Option<ErrorCategory> {
        self.remote_cause().map(RemoteError::category)
    }

    /// Returns the remote failure behind this error.
    pub fn remote_cause(&self) -> Option<&RemoteError> {
        match self {
            SyncError::MutationRolledBack { cause }
            | SyncError::MutationRollbackFailed { cause }
            | SyncError::RetryExhausted { cause, .. }
            | SyncError::ReconciliationFailed { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Returns true if repeating the operation later could succeed.
    pub fn is_retryable(&self) -> bool {
        self.category().is_some_and(ErrorCategory::is_retryable)
    }

    /// Returns true if local state may have diverged from the remote.
    pub fn requires_reconciliation(&self) -> bool {
        matches!(
            self,
            SyncError::MutationRollbackFailed { .. }
                | SyncError::ReconciliationFailed {
                    restored: false,
                    ..
                }
        )
    }
}
