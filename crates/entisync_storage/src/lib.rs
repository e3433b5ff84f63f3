//! # EntiSync Storage
//!
//! Durable key-value storage backends for EntiSync.
//!
//! Backends are **opaque byte stores** keyed by short names. They do not
//! interpret the values they hold; the sync engine owns the encoding of the
//! offline action list stored under its queue key.
//!
//! ## Design Principles
//!
//! - A write replaces the whole value for a key atomically: readers observe
//!   either the previous value or the new one, never a partial write
//! - Backends must be `Send + Sync` so they can be shared behind an `Arc`
//! - A file backend directory has exactly one writer process at a time
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral state
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use entisync_storage::{InMemoryBackend, KvBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.write("queue", b"[]").unwrap();
//! assert_eq!(backend.read("queue").unwrap().as_deref(), Some(&b"[]"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{validate_key, KvBackend, MAX_KEY_LEN};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
