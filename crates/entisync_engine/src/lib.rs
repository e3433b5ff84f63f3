//! # EntiSync Engine
//!
//! Optimistic mutation, retry and offline replay for EntiSync.
//!
//! This crate provides:
//! - [`SyncCoordinator`] - snapshot, mutate, confirm remotely, then commit,
//!   roll back or queue
//! - [`RetryExecutor`] - bounded exponential backoff with jitter for
//!   retryable failure categories
//! - [`ConnectivityMonitor`] - periodic reachability probing with transition
//!   callbacks
//! - [`OfflineQueue`] - durable, ordered replay of actions recorded while
//!   the remote was unreachable
//! - [`RemoteStore`] and [`ConnectivityProbe`] - the collaborator seams
//!
//! ## Example
//!
//! ```rust,ignore
//! use entisync_engine::{ConnectivityMonitor, SyncConfig, SyncCoordinator};
//! use entisync_storage::FileBackend;
//! use std::sync::Arc;
//!
//! let config = SyncConfig::default();
//! let monitor = Arc::new(ConnectivityMonitor::new(probe, config.connectivity.clone()));
//! let storage = Arc::new(FileBackend::open(&data_dir)?);
//! let coordinator = Arc::new(SyncCoordinator::new(config, remote, storage, monitor)?);
//! let tasks = coordinator.start();
//!
//! coordinator.update_entity(avatar).await?;
//! ```
//!
//! ## Key Invariants
//!
//! - A rejected mutation leaves local state as it was before the mutation
//! - Offline actions replay in enqueue order and leave the queue only once
//!   the remote has them
//! - Permanent failure categories are never retried

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod coordinator;
mod error;
mod events;
mod locks;
mod queue;
mod remote;
mod retry;

pub use config::{ConnectivityConfig, RetryConfig, SyncConfig, DEFAULT_QUEUE_KEY};
pub use connectivity::{
    ConnectivityMonitor, ConnectivityProbe, ConnectivityState, SubscriptionId,
};
pub use coordinator::{
    MutationOutcome, MutationRequest, ReconcileReport, SyncCoordinator, SyncStats, SyncTasks,
};
pub use error::{SyncError, SyncResult};
pub use events::{MutationState, SyncEvent};
pub use queue::{ActionStore, DrainReport, DrainStop, DrainStopReason, OfflineQueue};
pub use remote::RemoteStore;
pub use retry::{RetryError, RetryExecutor};

// Re-export the building blocks so hosts only need this crate.
pub use entisync_core::{
    ActionKind, Entity, EntityId, EntityStore, ErrorCategory, OfflineAction, OperationId,
    OwnerId, RemoteError, RemoteResult, SnapshotTimestamp, StoreView, ViewMode,
};
