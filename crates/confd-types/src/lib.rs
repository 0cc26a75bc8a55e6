//! Common types for the confd configuration daemon.
//!
//! This crate provides type-safe representations of the identifiers used
//! throughout the confd control plane:
//!
//! - [`SessionId`]: names a configuration session
//! - [`PersistId`]: addresses a pending confirmed commit across processes
//! - [`Uid`]: numeric user identity of a caller
//! - [`RevisionId`]: a numbered point in commit history
//! - [`CandidateHandle`]: non-owning handle to a candidate configuration
//! - [`SnapshotRef`]: non-owning reference to a configuration snapshot

mod handle;
mod ids;
mod revision;

pub use handle::{CandidateHandle, SnapshotRef};
pub use ids::{PersistId, SessionId, Uid};
pub use revision::RevisionId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid session id: {0} (1-64 chars of [A-Za-z0-9._-])")]
    InvalidSessionId(String),

    #[error("invalid persist id: {0} (must be non-empty)")]
    InvalidPersistId(String),

    #[error("invalid revision number: {0}")]
    InvalidRevision(String),
}
