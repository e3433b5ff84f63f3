//! Registry of in-flight optimistic operations.

use crate::types::OperationId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default age after which a pending operation is considered abandoned.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracks operations whose remote call has neither completed nor been
/// abandoned.
///
/// Callers pass the current instant explicitly so the engine can drive the
/// registry from a controllable clock.
///
/// # Invariants
///
/// - An ID is present iff its remote call is still outstanding
/// - Completing, failing or sweeping an absent ID is a no-op
#[derive(Debug)]
pub struct PendingOperations {
    started: HashMap<OperationId, Instant>,
    timeout: Duration,
}

impl PendingOperations {
    /// Creates a registry with the given timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            started: HashMap::new(),
            timeout,
        }
    }

    /// Returns the configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Registers an operation started at `now`.
    ///
    /// Returns false if the ID is already pending; the original start time
    /// is kept.
    pub fn register(&mut self, id: OperationId, now: Instant) -> bool {
        if self.started.contains_key(&id) {
            return false;
        }
        self.started.insert(id, now);
        true
    }

    /// Marks an operation as completed. Returns false if it was not pending.
    pub fn complete(&mut self, id: &OperationId) -> bool {
        self.started.remove(id).is_some()
    }

    /// Marks an operation as failed. Returns false if it was not pending.
    pub fn fail(&mut self, id: &OperationId) -> bool {
        self.started.remove(id).is_some()
    }

    /// Returns true if the operation is outstanding.
    #[must_use]
    pub fn is_pending(&self, id: &OperationId) -> bool {
        self.started.contains_key(id)
    }

    /// Returns when the operation started.
    #[must_use]
    pub fn started_at(&self, id: &OperationId) -> Option<Instant> {
        self.started.get(id).copied()
    }

    /// Removes and returns every operation older than the timeout at `now`.
    ///
    /// The returned IDs are sorted.
    pub fn sweep(&mut self, now: Instant) -> Vec<OperationId> {
        let timeout = self.timeout;
        let mut expired: Vec<OperationId> = self
            .started
            .iter()
            .filter(|(_, started)| now.saturating_duration_since(**started) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.started.remove(id);
        }
        expired.sort();
        expired
    }

    /// Returns the number of outstanding operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.started.len()
    }

    /// Returns true if nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }
}

impl Default for PendingOperations {
    fn default() -> Self {
        Self::new(DEFAULT_PENDING_TIMEOUT)
    }
}
