//! Error types for EntiSync core.

use crate::snapshot::SnapshotTimestamp;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// A snapshot operation was refused.
///
/// No variant ever leaves the store partially restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The history is empty.
    #[error("rollback impossible: snapshot history is empty")]
    NoHistory,

    /// No retained snapshot carries the requested timestamp.
    #[error("rollback impossible: no snapshot at {0}")]
    NotFound(SnapshotTimestamp),

    /// A pushed snapshot reuses the timestamp of a retained one.
    #[error("snapshot {0} is already retained")]
    DuplicateTimestamp(SnapshotTimestamp),
}
