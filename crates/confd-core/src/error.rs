//! Error types for confd core operations.
//!
//! Every failure the core can produce is one of these structured kinds;
//! rendering them as human-readable CLI text is left to the dispatcher.
//! All errors implement `std::error::Error` via `thiserror`.

use confd_types::{PersistId, RevisionId, SessionId};
use thiserror::Error;

use crate::lock::LockKind;

/// Result type alias for confd core operations.
pub type ConfdResult<T> = Result<T, ConfdError>;

/// Errors that can occur in the session and commit core.
#[derive(Debug, Error)]
pub enum ConfdError {
    /// No session with the given id exists.
    #[error("Session '{session}' does not exist")]
    SessionNotFound {
        /// The session id that was looked up.
        session: SessionId,
    },

    /// Caller is not allowed to see or act on the target.
    #[error("Access denied: {reason}")]
    AccessDenied {
        /// Why access was denied.
        reason: String,
    },

    /// The global commit lock is held by someone else.
    #[error("{}: held by {holder}", .kind.busy_message())]
    LockBusy {
        /// Kind of the lock currently held.
        kind: LockKind,
        /// Holder description of the current owner.
        holder: String,
    },

    /// No confirmed commit is pending.
    #[error("No confirmed commit is pending")]
    NoPendingConfirm,

    /// A persist id was supplied but does not match the pending confirm.
    #[error("Persist id '{supplied}' does not match the pending confirmed commit")]
    PersistIdMismatch {
        /// The id the caller supplied.
        supplied: PersistId,
    },

    /// A confirmed commit is already pending.
    ///
    /// The dispatcher protocol silently accepts the previous confirm before
    /// scheduling a new one, so hitting this indicates a caller bug.
    #[error("A confirmed commit ({persist_id}) is already pending")]
    AlreadyPending {
        /// Persist id of the pending confirm.
        persist_id: PersistId,
    },

    /// The commit log has no entry with the given number.
    #[error("Revision {revision} not found in commit log")]
    RevisionNotFound {
        /// The revision number that was requested.
        revision: RevisionId,
    },

    /// The external validator rejected the candidate.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Validator diagnostic text.
        message: String,
    },

    /// The external applier failed to activate a candidate or snapshot.
    #[error("Apply failed: {message}")]
    ApplyFailed {
        /// Applier diagnostic text.
        message: String,
    },

    /// A backing-store operation failed.
    #[error("Store operation failed: {operation}: {message}")]
    Store {
        /// The operation that failed (e.g., "append", "load").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl ConfdError {
    /// Creates a session-not-found error.
    pub fn session_not_found(session: SessionId) -> Self {
        Self::SessionNotFound { session }
    }

    /// Creates an access-denied error.
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    /// Creates a validation-failed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Creates an apply-failed error.
    pub fn apply_failed(message: impl Into<String>) -> Self {
        Self::ApplyFailed {
            message: message.into(),
        }
    }

    /// Creates a store error.
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error means the operation can be retried
    /// unchanged once the current commit or maintenance finishes.
    pub fn is_lock_busy(&self) -> bool {
        matches!(self, ConfdError::LockBusy { .. })
    }
}
