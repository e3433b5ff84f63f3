//! Per-key mutual exclusion for optimistic mutations.

use entisync_core::EntityId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes mutations that target the same key.
///
/// Entries exist only while some task holds or waits for the key.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<EntityId, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    ///
    /// Dropping the returned future before it resolves releases the
    /// waiter's claim on the entry.
    pub(crate) async fn lock(&self, key: &EntityId) -> KeyGuard<'_> {
        let slot = SlotRef {
            locks: self,
            key: key.clone(),
            mutex: Arc::clone(self.locks.lock().entry(key.clone()).or_default()),
        };
        let guard = Arc::clone(&slot.mutex).lock_owned().await;
        KeyGuard {
            _guard: guard,
            _slot: slot,
        }
    }

    /// Returns true if a mutation currently holds or awaits `key`.
    pub(crate) fn is_busy(&self, key: &EntityId) -> bool {
        self.locks.lock().contains_key(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// One holder's or waiter's claim on a map entry.
struct SlotRef<'a> {
    locks: &'a KeyLocks,
    key: EntityId,
    mutex: Arc<AsyncMutex<()>>,
}

impl Drop for SlotRef<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock();
        // The map and this claim are the only references left.
        if Arc::strong_count(&self.mutex) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Exclusive access to one key. Fields drop in order, so the mutex is
/// released before the entry is pruned.
pub(crate) struct KeyGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _slot: SlotRef<'a>,
}
