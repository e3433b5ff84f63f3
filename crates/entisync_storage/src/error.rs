//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key contains characters or a length no backend accepts.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Another process holds the storage directory lock.
    #[error("storage directory is locked by another process")]
    Locked,

    /// The storage location exists but is not usable.
    #[error("invalid storage location: {0}")]
    InvalidLocation(String),
}
