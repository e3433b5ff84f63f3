//! # EntiSync Core
//!
//! In-memory building blocks for the EntiSync optimistic sync layer.
//!
//! This crate provides:
//! - [`EntityStore`] - keyed local mirror of remote entities with an owner
//!   index, an active selection pointer and per-entity view modes
//! - [`SnapshotManager`] - bounded history of immutable store copies with
//!   rollback
//! - [`PendingOperations`] - registry of in-flight remote calls with timeout
//!   sweeping
//! - [`ErrorCategory`] and [`RemoteError`] - the closed failure taxonomy every
//!   remote failure is classified into
//! - [`OfflineAction`] - the record replayed after connectivity returns
//!
//! Nothing in this crate performs I/O. The engine crate wires these pieces
//! to the remote store, durable storage and connectivity probe.
//!
//! ## Key Invariants
//!
//! - `EntityStore::get` on a missing ID returns `None`, never a default value
//! - Snapshot history is ordered oldest → newest and bounded
//! - A failure is classified into exactly one category before any retry or
//!   rollback decision

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod category;
mod error;
mod pending;
mod snapshot;
mod store;
mod types;

pub use action::{unix_millis, ActionKind, OfflineAction};
pub use category::{ErrorCategory, RemoteError, RemoteResult};
pub use error::{SnapshotError, SnapshotResult};
pub use pending::{PendingOperations, DEFAULT_PENDING_TIMEOUT};
pub use snapshot::{SnapshotManager, SnapshotTimestamp, StateSnapshot, DEFAULT_SNAPSHOT_CAPACITY};
pub use store::{EntityStore, EntryMut, StoreView};
pub use types::{Entity, EntityId, OperationId, OwnerId, ViewMode};
