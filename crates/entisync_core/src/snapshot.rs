//! Snapshot history and rollback.

use crate::error::{SnapshotError, SnapshotResult};
use crate::store::{EntityStore, StoreView};
use crate::types::Entity;
use std::collections::VecDeque;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Default number of snapshots retained.
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 10;

/// Creation time of a snapshot, in microseconds since the Unix epoch.
///
/// Timestamps handed out by one [`SnapshotManager`] are strictly increasing,
/// so they double as snapshot identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotTimestamp(pub u64);

impl SnapshotTimestamp {
    /// Reads the wall clock.
    #[must_use]
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();
        Self(micros)
    }

    /// Returns the raw microsecond value.
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snap:{}", self.0)
    }
}

/// An immutable point-in-time copy of an [`EntityStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot<E> {
    timestamp: SnapshotTimestamp,
    view: StoreView<E>,
}

impl<E> StateSnapshot<E> {
    /// Wraps a captured store view.
    pub fn new(timestamp: SnapshotTimestamp, view: StoreView<E>) -> Self {
        Self { timestamp, view }
    }

    /// Returns the creation timestamp.
    pub fn timestamp(&self) -> SnapshotTimestamp {
        self.timestamp
    }

    /// Returns the captured state.
    pub fn view(&self) -> &StoreView<E> {
        &self.view
    }
}

/// Bounded, ordered history of store snapshots.
///
/// # Invariants
///
/// - History is ordered oldest → newest by timestamp
/// - History never holds more than `capacity` snapshots; the oldest is
///   evicted first
/// - A rollback either restores the store and trims history, or reports
///   [`SnapshotError`] and changes nothing
pub struct SnapshotManager<E> {
    history: VecDeque<StateSnapshot<E>>,
    capacity: usize,
    last_timestamp: SnapshotTimestamp,
}

impl<E: Entity> SnapshotManager<E> {
    /// Creates a manager retaining at most `capacity` snapshots (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            last_timestamp: SnapshotTimestamp(0),
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a timestamp strictly greater than every one issued so far.
    pub fn next_timestamp(&mut self) -> SnapshotTimestamp {
        let now = SnapshotTimestamp::now();
        let next = if now > self.last_timestamp {
            now
        } else {
            SnapshotTimestamp(self.last_timestamp.0 + 1)
        };
        self.last_timestamp = next;
        next
    }

    /// Captures the store and pushes the snapshot.
    pub fn capture(&mut self, store: &EntityStore<E>) -> SnapshotTimestamp {
        let timestamp = self.next_timestamp();
        self.insert(StateSnapshot::new(timestamp, store.snapshot_view()));
        timestamp
    }

    /// Appends a snapshot, evicting the oldest ones beyond capacity.
    ///
    /// A snapshot older than the newest retained one is inserted at its
    /// ordered position. Returns how many snapshots were evicted.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::DuplicateTimestamp`] if a retained snapshot
    /// already carries the same timestamp; the history is left unchanged.
    pub fn push(&mut self, snapshot: StateSnapshot<E>) -> SnapshotResult<usize> {
        if self.contains(snapshot.timestamp) {
            return Err(SnapshotError::DuplicateTimestamp(snapshot.timestamp));
        }
        Ok(self.insert(snapshot))
    }

    fn insert(&mut self, snapshot: StateSnapshot<E>) -> usize {
        let timestamp = snapshot.timestamp;
        if timestamp > self.last_timestamp {
            self.last_timestamp = timestamp;
        }

        let position = self
            .history
            .partition_point(|existing| existing.timestamp < timestamp);
        self.history.insert(position, snapshot);

        let mut evicted = 0;
        while self.history.len() > self.capacity {
            self.history.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "snapshot history full");
        }
        evicted
    }

    /// Restores the newest snapshot and removes it from history.
    ///
    /// A second call rolls back one step further.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NoHistory`] if there is nothing to restore.
    pub fn rollback_to_last(
        &mut self,
        store: &mut EntityStore<E>,
    ) -> SnapshotResult<SnapshotTimestamp> {
        let snapshot = self.history.pop_back().ok_or(SnapshotError::NoHistory)?;
        store.restore(&snapshot.view);
        debug!(timestamp = %snapshot.timestamp, "rolled back to last snapshot");
        Ok(snapshot.timestamp)
    }

    /// Restores the snapshot taken at `timestamp`.
    ///
    /// That snapshot and every newer one are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotFound`] if no retained snapshot matches.
    pub fn rollback_to(
        &mut self,
        store: &mut EntityStore<E>,
        timestamp: SnapshotTimestamp,
    ) -> SnapshotResult<()> {
        let position = self
            .position(timestamp)
            .ok_or(SnapshotError::NotFound(timestamp))?;

        store.restore(&self.history[position].view);
        let discarded = self.history.len() - position;
        self.history.truncate(position);
        debug!(%timestamp, discarded, "rolled back to snapshot");
        Ok(())
    }

    /// Removes exactly one snapshot without restoring it.
    ///
    /// Returns false if it was already gone (evicted or cleared).
    pub fn discard(&mut self, timestamp: SnapshotTimestamp) -> bool {
        self.take(timestamp).is_some()
    }

    /// Removes and returns exactly one snapshot.
    pub fn take(&mut self, timestamp: SnapshotTimestamp) -> Option<StateSnapshot<E>> {
        let position = self.position(timestamp)?;
        self.history.remove(position)
    }

    /// Returns true if a snapshot with this timestamp is retained.
    #[must_use]
    pub fn contains(&self, timestamp: SnapshotTimestamp) -> bool {
        self.position(timestamp).is_some()
    }

    /// Returns the newest snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<&StateSnapshot<E>> {
        self.history.back()
    }

    /// Returns the retained timestamps, oldest first.
    #[must_use]
    pub fn timestamps(&self) -> Vec<SnapshotTimestamp> {
        self.history.iter().map(|s| s.timestamp).collect()
    }

    /// Returns the number of retained snapshots.
    #[must_use]
    pub fn history_size(&self) -> usize {
        self.history.len()
    }

    /// Drops all history.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    fn position(&self, timestamp: SnapshotTimestamp) -> Option<usize> {
        self.history
            .binary_search_by(|s| s.timestamp.cmp(&timestamp))
            .ok()
    }
}

impl<E: Entity> Default for SnapshotManager<E> {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}
