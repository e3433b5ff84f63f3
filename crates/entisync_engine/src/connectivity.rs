//! Connectivity monitoring.

use crate::config::ConnectivityConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Whether the remote store is believed reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    /// The last probe reached the remote.
    Online,
    /// The last probe failed or timed out.
    Offline,
}

impl ConnectivityState {
    /// Returns true if online.
    pub fn is_online(self) -> bool {
        matches!(self, ConnectivityState::Online)
    }

    fn from_online(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Online => f.write_str("online"),
            ConnectivityState::Offline => f.write_str("offline"),
        }
    }
}

/// A cheap reachability check against the remote store.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true if the remote answered.
    async fn is_reachable(&self) -> bool;
}

/// Handle returned by [`ConnectivityMonitor::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(ConnectivityState) + Send + Sync>;

/// Tracks reachability and notifies subscribers on every transition.
///
/// # Invariants
///
/// - Listeners run once per actual transition, never on a repeated state
/// - Listeners may subscribe or unsubscribe from inside a callback
pub struct ConnectivityMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    config: ConnectivityConfig,
    online: AtomicBool,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    transitions: AtomicU64,
}

impl ConnectivityMonitor {
    /// Creates a monitor. The initial state comes from `assume_online`.
    pub fn new(probe: Arc<dyn ConnectivityProbe>, config: ConnectivityConfig) -> Self {
        let online = config.assume_online;
        Self {
            probe,
            config,
            online: AtomicBool::new(online),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            transitions: AtomicU64::new(0),
        }
    }

    /// Returns the last known state.
    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from_online(self.is_online())
    }

    /// Returns true if the last known state is online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns the number of transitions observed.
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::SeqCst)
    }

    /// Registers a transition listener.
    ///
    /// Listeners run synchronously on the probing task and must not block.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(ConnectivityState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Returns the number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Probes the remote once and applies the result.
    ///
    /// A probe that exceeds `probe_timeout` counts as offline.
    pub async fn probe_now(&self) -> ConnectivityState {
        let reachable = tokio::time::timeout(self.config.probe_timeout, self.probe.is_reachable())
            .await
            .unwrap_or_else(|_| {
                debug!(timeout = ?self.config.probe_timeout, "connectivity probe timed out");
                false
            });
        let state = ConnectivityState::from_online(reachable);
        self.set_state(state);
        state
    }

    /// Records a state observed elsewhere.
    ///
    /// Returns true and notifies listeners if the state changed.
    pub fn set_state(&self, state: ConnectivityState) -> bool {
        let previous = self.online.swap(state.is_online(), Ordering::SeqCst);
        if previous == state.is_online() {
            return false;
        }

        self.transitions.fetch_add(1, Ordering::SeqCst);
        info!(%state, "connectivity changed");

        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(state);
        }
        true
    }

    /// Spawns the periodic probe loop.
    ///
    /// The first probe runs immediately.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.probe_now().await;
            }
        })
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .field("transitions", &self.transitions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FixedProbe(AtomicBool);

    #[async_trait]
    impl ConnectivityProbe for FixedProbe {
        async fn is_reachable(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl ConnectivityProbe for HangingProbe {
        async fn is_reachable(&self) -> bool {
            std::future::pending::<()>().await;
            true
        }
    }

    fn monitor(reachable: bool) -> (Arc<FixedProbe>, ConnectivityMonitor) {
        let probe = Arc::new(FixedProbe(AtomicBool::new(reachable)));
        let monitor = ConnectivityMonitor::new(probe.clone(), ConnectivityConfig::default());
        (probe, monitor)
    }

    #[tokio::test]
    async fn notifies_once_per_transition() {
        let (probe, monitor) = monitor(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        monitor.subscribe(move |state| sink.lock().push(state));

        monitor.probe_now().await;
        probe.0.store(false, Ordering::SeqCst);
        monitor.probe_now().await;
        monitor.probe_now().await;
        probe.0.store(true, Ordering::SeqCst);
        monitor.probe_now().await;

        assert_eq!(
            *seen.lock(),
            vec![ConnectivityState::Offline, ConnectivityState::Online]
        );
        assert_eq!(monitor.transitions(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_inside_callback() {
        let (_, monitor) = monitor(true);
        let monitor = Arc::new(monitor);
        let calls = Arc::new(AtomicU64::new(0));

        let slot = Arc::new(Mutex::new(None));
        let (inner, counter) = (monitor.clone(), calls.clone());
        let handle = slot.clone();
        let id = monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *handle.lock() {
                inner.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        monitor.set_state(ConnectivityState::Offline);
        monitor.set_state(ConnectivityState::Online);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribe_inside_callback() {
        let (_, monitor) = monitor(true);
        let monitor = Arc::new(monitor);
        let inner = monitor.clone();
        monitor.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        monitor.set_state(ConnectivityState::Offline);
        assert_eq!(monitor.subscriber_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_counts_as_offline() {
        let monitor = ConnectivityMonitor::new(
            Arc::new(HangingProbe),
            ConnectivityConfig::default().with_probe_timeout(Duration::from_secs(1)),
        );

        assert_eq!(monitor.probe_now().await, ConnectivityState::Offline);
        assert!(!monitor.is_online());
    }

    #[test]
    fn initial_state_from_config() {
        let probe = Arc::new(FixedProbe(AtomicBool::new(true)));
        let monitor = ConnectivityMonitor::new(
            probe,
            ConnectivityConfig::default().with_assume_online(false),
        );
        assert_eq!(monitor.state(), ConnectivityState::Offline);
        assert!(!monitor.unsubscribe(SubscriptionId(99)));
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_probes_periodically() {
        let (probe, monitor) = monitor(true);
        let monitor = Arc::new(monitor);
        let handle = monitor.start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(monitor.is_online());

        probe.0.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!monitor.is_online());

        handle.abort();
    }
}
