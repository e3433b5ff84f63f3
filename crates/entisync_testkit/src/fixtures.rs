//! Test fixtures and coordinator helpers.
//!
//! Provides a fixture entity and a coordinator wired to in-process
//! doubles, so scenario tests only describe what the remote does.

use crate::probe::ScriptedProbe;
use crate::remote::ScriptedRemote;
use entisync_core::{Entity, EntityId, OwnerId};
use entisync_engine::{
    ConnectivityMonitor, ConnectivityState, RetryConfig, SyncConfig, SyncCoordinator,
};
use entisync_storage::{FileBackend, InMemoryBackend, KvBackend};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A user avatar: the fixture entity for coordinator tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    /// Avatar ID.
    pub id: EntityId,
    /// Owning user.
    pub owner: OwnerId,
    /// Display name.
    pub name: String,
}

impl Avatar {
    /// Returns a copy with a different name.
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Returns a copy with a different owner.
    pub fn moved_to(&self, owner: &str) -> Self {
        Self {
            owner: OwnerId::new(owner),
            ..self.clone()
        }
    }
}

impl Entity for Avatar {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn owner(&self) -> &OwnerId {
        &self.owner
    }
}

/// Builds an avatar.
pub fn avatar(id: &str, owner: &str, name: &str) -> Avatar {
    Avatar {
        id: EntityId::new(id),
        owner: OwnerId::new(owner),
        name: name.to_string(),
    }
}

/// A configuration with millisecond retry delays.
pub fn fast_config() -> SyncConfig {
    SyncConfig::default().with_retry(
        RetryConfig::default()
            .with_base_delay(Duration::from_millis(2))
            .with_max_delay(Duration::from_millis(10)),
    )
}

/// Coordinator type used by the harness.
pub type TestCoordinator = SyncCoordinator<Avatar, ScriptedRemote>;

/// A coordinator wired to a scripted remote, a scripted probe and a
/// storage backend.
pub struct TestHarness {
    /// The coordinator under test.
    pub coordinator: Arc<TestCoordinator>,
    /// The remote double.
    pub remote: Arc<ScriptedRemote>,
    /// The probe double.
    pub probe: Arc<ScriptedProbe>,
    /// The monitor shared with the coordinator.
    pub monitor: Arc<ConnectivityMonitor>,
    /// The storage backend holding the offline queue.
    pub storage: Arc<dyn KvBackend>,
    _temp_dir: Option<TempDir>,
}

impl TestHarness {
    /// Creates a harness with [`fast_config`], an empty remote and
    /// in-memory storage.
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    /// Creates a harness with the given configuration.
    pub fn with_config(config: SyncConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(ScriptedRemote::new()),
            Arc::new(InMemoryBackend::new()),
        )
    }

    /// Creates a harness whose queue lives in a fresh temporary directory.
    pub fn with_file_storage(config: SyncConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = FileBackend::open(temp_dir.path()).expect("Failed to open file backend");
        let mut harness =
            Self::with_parts(config, Arc::new(ScriptedRemote::new()), Arc::new(backend));
        harness._temp_dir = Some(temp_dir);
        harness
    }

    /// Creates a harness from explicit parts.
    pub fn with_parts(
        config: SyncConfig,
        remote: Arc<ScriptedRemote>,
        storage: Arc<dyn KvBackend>,
    ) -> Self {
        let probe = Arc::new(ScriptedProbe::new(config.connectivity.assume_online));
        let monitor = Arc::new(ConnectivityMonitor::new(
            probe.clone(),
            config.connectivity.clone(),
        ));
        let coordinator =
            SyncCoordinator::new(config, remote.clone(), storage.clone(), monitor.clone())
                .expect("Failed to create coordinator");

        Self {
            coordinator: Arc::new(coordinator),
            remote,
            probe,
            monitor,
            storage,
            _temp_dir: None,
        }
    }

    /// Builds a second coordinator over the same remote and storage, as a
    /// restarted process would.
    pub fn restart(&self, config: SyncConfig) -> Arc<TestCoordinator> {
        let coordinator = SyncCoordinator::new(
            config,
            self.remote.clone(),
            self.storage.clone(),
            self.monitor.clone(),
        )
        .expect("Failed to restart coordinator");
        Arc::new(coordinator)
    }

    /// Marks the remote unreachable.
    pub fn go_offline(&self) {
        self.probe.set_reachable(false);
        self.monitor.set_state(ConnectivityState::Offline);
    }

    /// Marks the remote reachable again.
    pub fn go_online(&self) {
        self.probe.set_reachable(true);
        self.monitor.set_state(ConnectivityState::Online);
    }

    /// Seeds the remote with `rows` and pulls them into the local store.
    pub async fn seed(&self, rows: impl IntoIterator<Item = Avatar>) {
        let mut owners = Vec::new();
        for row in rows {
            if !owners.contains(&row.owner) {
                owners.push(row.owner.clone());
            }
            self.remote.insert_row(row);
        }
        for owner in owners {
            self.coordinator
                .fetch_owner(&owner)
                .await
                .expect("Failed to seed local store");
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
