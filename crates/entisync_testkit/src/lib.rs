//! # EntiSync Testkit
//!
//! Test utilities for EntiSync.
//!
//! This crate provides:
//! - [`Avatar`], a fixture entity, and [`TestHarness`], a coordinator wired
//!   to in-process doubles
//! - [`ScriptedRemote`], a remote store with scripted failures, pausing and
//!   a call log
//! - [`ScriptedProbe`], a connectivity probe the test flips by hand
//! - Property-based test generators using proptest
//! - [`init_tracing`] for readable logs in failing tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entisync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn rejected_update_rolls_back() {
//!     let harness = TestHarness::new();
//!     harness.remote.fail_key("a1", RemoteError::authorization("denied"));
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod probe;
pub mod remote;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::probe::*;
    pub use crate::remote::*;
    pub use entisync_engine::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use probe::*;
pub use remote::*;
