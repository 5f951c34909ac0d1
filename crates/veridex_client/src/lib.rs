#![forbid(unsafe_code)]
#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::result_large_err
)]

//! veridex client — configuration and session plumbing around the verifier.
//!
//! The consistency engine itself is transport-agnostic and log-free; this
//! crate supplies the pieces a real client needs around it: a TOML config
//! loader with the pinned directory signing key, a snapshot store seam, and
//! a session wrapper that logs check outcomes and forwards accepted epochs
//! to an optional audit sink.

pub mod config;
pub mod session;
pub mod store;

pub use config::{ClientConfig, ConfigError};
pub use session::ClientSession;
pub use store::{MemorySnapshotStore, SnapshotStore};
