//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};

/// Maximum length of a storage key in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// A durable key-value backend.
///
/// Values are **opaque byte blobs**. A backend never merges or appends to a
/// value; every [`write`](KvBackend::write) replaces the previous value for
/// the key as a single unit.
///
/// # Invariants
///
/// - `read` returns exactly the bytes of the last successful `write`
/// - A failed `write` leaves the previous value intact
/// - No partially written value is ever observable, including after a crash
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait KvBackend: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing has been written under the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically replaces the value stored under `key`.
    ///
    /// After this returns successfully the value is durable to the extent
    /// the backend supports durability.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails. On error
    /// the previous value is still readable.
    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Removes the value stored under `key`.
    ///
    /// Returns `true` if a value was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Lists all keys that currently hold a value, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the keys cannot be enumerated.
    fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Checks that `key` is usable by every backend.
///
/// Keys are non-empty, at most [`MAX_KEY_LEN`] bytes, and consist of ASCII
/// alphanumerics, `-`, `_` and `.`, not starting with `.`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] when the key is rejected.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
