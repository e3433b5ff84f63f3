//! In-memory storage backend for testing.

use crate::backend::{validate_key, KvBackend};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-memory key-value backend.
///
/// This backend keeps all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral clients that don't need the offline queue to survive restarts
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use entisync_storage::{InMemoryBackend, KvBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.write("k", b"v1").unwrap();
/// backend.write("k", b"v2").unwrap();
/// assert_eq!(backend.read("k").unwrap(), Some(b"v2".to_vec()));
/// assert_eq!(backend.write_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    values: RwLock<BTreeMap<String, Vec<u8>>>,
    writes: AtomicU64,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with one value.
    ///
    /// Useful for testing recovery of a previously persisted queue.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: Vec<u8>) -> Self {
        let backend = Self::default();
        backend.values.write().insert(key.into(), value);
        backend
    }

    /// Returns how many successful writes this backend has accepted.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Clears all values from the backend.
    pub fn clear(&self) {
        self.values.write().clear();
    }
}

impl KvBackend for InMemoryBackend {
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.values.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.values.write().insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.values.write().remove(key).is_some())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.values.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.keys().unwrap().is_empty());
        assert_eq!(backend.read("missing").unwrap(), None);
    }

    #[test]
    fn memory_write_replaces_value() {
        let backend = InMemoryBackend::new();
        backend.write("queue", b"first").unwrap();
        backend.write("queue", b"second").unwrap();

        assert_eq!(backend.read("queue").unwrap(), Some(b"second".to_vec()));
        assert_eq!(backend.write_count(), 2);
    }

    #[test]
    fn memory_remove() {
        let backend = InMemoryBackend::new();
        backend.write("queue", b"x").unwrap();

        assert!(backend.remove("queue").unwrap());
        assert!(!backend.remove("queue").unwrap());
        assert_eq!(backend.read("queue").unwrap(), None);
    }

    #[test]
    fn memory_keys_sorted() {
        let backend = InMemoryBackend::new();
        backend.write("b", b"").unwrap();
        backend.write("a", b"").unwrap();

        assert_eq!(backend.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn memory_with_value() {
        let backend = InMemoryBackend::with_value("queue", b"preloaded".to_vec());
        assert_eq!(backend.read("queue").unwrap(), Some(b"preloaded".to_vec()));
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn memory_invalid_key_rejected() {
        let backend = InMemoryBackend::new();
        let result = backend.write("bad/key", b"x");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn memory_clear() {
        let backend = InMemoryBackend::new();
        backend.write("a", b"1").unwrap();
        backend.clear();
        assert!(backend.keys().unwrap().is_empty());
    }
}
