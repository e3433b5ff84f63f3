//! Scripted connectivity probe.

use async_trait::async_trait;
use entisync_engine::ConnectivityProbe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A probe whose answer the test controls.
#[derive(Debug)]
pub struct ScriptedProbe {
    reachable: AtomicBool,
    probes: AtomicU64,
}

impl ScriptedProbe {
    /// Creates a probe with the given initial answer.
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            probes: AtomicU64::new(0),
        }
    }

    /// Changes what the next probe reports.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Returns how many times the probe ran.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityProbe for ScriptedProbe {
    async fn is_reachable(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}
