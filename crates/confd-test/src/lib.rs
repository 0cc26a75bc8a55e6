//! Test infrastructure for the confd configuration daemon
//!
//! Provides:
//! - Mock collaborators (config store, validator, commit-log store)
//! - A pre-wired fixture bundling the core services
//! - Commit-log verification helpers
//! - Caller identity fixtures

pub mod fixtures;
mod mocks;
mod verification;

pub use fixtures::*;
pub use mocks::{Applied, MemoryCommitLogStore, MockConfigStore, StaticValidator};
pub use verification::*;
