//! Configuration for the sync coordinator.

use entisync_core::{DEFAULT_PENDING_TIMEOUT, DEFAULT_SNAPSHOT_CAPACITY};
use rand::Rng;
use std::time::Duration;

/// Storage key the offline queue is persisted under by default.
pub const DEFAULT_QUEUE_KEY: &str = "offline_actions";

/// Configuration for the sync coordinator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retry configuration for remote calls.
    pub retry: RetryConfig,
    /// Connectivity probing configuration.
    pub connectivity: ConnectivityConfig,
    /// Maximum number of snapshots retained.
    pub snapshot_capacity: usize,
    /// Age after which an in-flight operation is reported as timed out.
    pub pending_timeout: Duration,
    /// How often the pending-operation sweep runs.
    pub sweep_interval: Duration,
    /// Storage key for the persisted offline queue.
    pub queue_key: String,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl SyncConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            connectivity: ConnectivityConfig::default(),
            snapshot_capacity: DEFAULT_SNAPSHOT_CAPACITY,
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
            sweep_interval: Duration::from_secs(5),
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            event_capacity: 256,
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the connectivity configuration.
    pub fn with_connectivity(mut self, connectivity: ConnectivityConfig) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Sets the snapshot capacity.
    pub fn with_snapshot_capacity(mut self, capacity: usize) -> Self {
        self.snapshot_capacity = capacity;
        self
    }

    /// Sets the pending-operation timeout.
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }

    /// Sets the pending sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the storage key of the offline queue.
    pub fn with_queue_key(mut self, key: impl Into<String>) -> Self {
        self.queue_key = key.into();
        self
    }

    /// Sets the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// `max_attempts` counts every call, the first one included.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Doubles the delay after each failure when set.
    pub use_backoff: bool,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            use_backoff: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            use_backoff: false,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enables or disables exponential backoff.
    pub fn with_backoff(mut self, use_backoff: bool) -> Self {
        self.use_backoff = use_backoff;
        self
    }

    /// Calculates the wait after the given failed attempt (1-indexed).
    ///
    /// `jitter` is clamped to `[0.5, 1.0]` and scales the undelayed backoff
    /// before the `max_delay` cap is applied. Attempt 0 never waits.
    pub fn delay_for_attempt(&self, attempt: u32, jitter: f64) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = if self.use_backoff {
            attempt.saturating_sub(1).min(62) as i32
        } else {
            0
        };
        let jitter = jitter.clamp(0.5, 1.0);
        let delay_secs = self.base_delay.as_secs_f64() * 2f64.powi(exponent) * jitter;

        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// Draws a jittered delay for the given failed attempt.
    pub fn sample_delay(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        self.delay_for_attempt(attempt, jitter)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Configuration for connectivity probing.
#[derive(Debug, Clone)]
pub struct ConnectivityConfig {
    /// Interval between background probes.
    pub probe_interval: Duration,
    /// Probes slower than this count as unreachable.
    pub probe_timeout: Duration,
    /// State assumed before the first probe completes.
    pub assume_online: bool,
}

impl ConnectivityConfig {
    /// Sets the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the initial state assumption.
    pub fn with_assume_online(mut self, online: bool) -> Self {
        self.assume_online = online;
        self
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            assume_online: true,
        }
    }
}
