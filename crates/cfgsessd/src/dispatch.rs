//! Typed request dispatch.
//!
//! The RPC surface is an explicit enumerated request type: one variant per
//! client-facing method, each carrying strongly typed fields. There is no
//! name-based or reflective dispatch, so a malformed method or a
//! wrong-typed result is a compile error, not a runtime one.
//!
//! The dispatcher is the sole consumer of the core services and encodes
//! the caller protocol the core expects, in particular silently accepting
//! any stale pending confirm before ordinary commits and rollbacks.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, info, instrument};

use confd_core::debug::areas;
use confd_core::{
    Applier, Caller, CommitLockService, CommitLog, ConfdError, ConfdResult, ConfigStore,
    ConfirmedCommitScheduler, DebugSettings, LockKind, SessionRegistry, Validator,
};
use confd_types::{PersistId, RevisionId, SessionId};

/// One client-facing request.
#[derive(Debug, Clone)]
pub enum Request {
    /// Attach to the named session, creating it if missing.
    SessionSetup { session: SessionId },
    /// Does a session with this id exist (regardless of visibility)?
    SessionExists { session: SessionId },
    /// Destroy the session and release its candidate.
    SessionTeardown { session: SessionId },
    /// Has the candidate diverged from its committed state?
    SessionChanged { session: SessionId },
    /// Has the candidate been saved/committed?
    SessionSaved { session: SessionId },
    /// Set the saved flag.
    SessionMarkSaved { session: SessionId },
    /// Clear the saved flag.
    SessionMarkUnsaved { session: SessionId },
    /// Validate, apply and log the session's candidate.
    Commit {
        session: SessionId,
        comment: String,
        debug: bool,
    },
    /// Commit with automatic rollback unless confirmed in time.
    CommitConfirm {
        session: SessionId,
        comment: String,
        debug: bool,
        timeout_minutes: u32,
    },
    /// Confirm the pending confirmed commit.
    Confirm { session: SessionId },
    /// Best-effort silent accept of any pending confirmed commit.
    ConfirmSilent { session: SessionId },
    /// Confirm by persist-id, possibly from another process.
    ConfirmPersistId { persist_id: PersistId },
    /// Cancel the pending confirmed commit and roll back now.
    CancelCommit {
        session: SessionId,
        comment: String,
        persist_id: Option<PersistId>,
        force: bool,
        debug: bool,
    },
    /// Re-apply the snapshot of an earlier revision.
    Rollback {
        session: SessionId,
        revision: RevisionId,
        comment: String,
        debug: bool,
    },
    /// Fetch the revision history as one description per revision.
    GetCommitLog,
}

/// Typed result of a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Yes/no answers (exists, changed, saved, created).
    Bool(bool),
    /// Human-readable result text.
    Text(String),
    /// Revision number to description, numerically ordered.
    CommitLog(BTreeMap<u64, String>),
}

impl Response {
    /// Returns the boolean answer, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Response::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the result text, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Response::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the commit log mapping, if this is one.
    pub fn as_commit_log(&self) -> Option<&BTreeMap<u64, String>> {
        match self {
            Response::CommitLog(map) => Some(map),
            _ => None,
        }
    }
}

/// Turns requests into operations on the core services.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    lock: Arc<CommitLockService>,
    log: Arc<CommitLog>,
    scheduler: Arc<ConfirmedCommitScheduler>,
    store: Arc<dyn ConfigStore>,
    validator: Arc<dyn Validator>,
    applier: Arc<dyn Applier>,
    debug: Arc<DebugSettings>,
}

impl Dispatcher {
    /// Wires a dispatcher over the core services and collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<SessionRegistry>,
        lock: Arc<CommitLockService>,
        log: Arc<CommitLog>,
        scheduler: Arc<ConfirmedCommitScheduler>,
        store: Arc<dyn ConfigStore>,
        validator: Arc<dyn Validator>,
        applier: Arc<dyn Applier>,
        debug: Arc<DebugSettings>,
    ) -> Self {
        Self {
            registry,
            lock,
            log,
            scheduler,
            store,
            validator,
            applier,
            debug,
        }
    }

    /// Handles one request on behalf of `caller`.
    pub async fn dispatch(&self, caller: &Caller, request: Request) -> ConfdResult<Response> {
        match request {
            Request::SessionSetup { session } => self.session_setup(caller, session).await,
            Request::SessionExists { session } => {
                Ok(Response::Bool(self.registry.exists(&session)))
            }
            Request::SessionTeardown { session } => self.session_teardown(caller, session).await,
            Request::SessionChanged { session } => {
                self.registry.lookup(&session, caller)?;
                Ok(Response::Bool(self.registry.is_changed(&session)?))
            }
            Request::SessionSaved { session } => {
                self.registry.lookup(&session, caller)?;
                Ok(Response::Bool(self.registry.is_saved(&session)?))
            }
            Request::SessionMarkSaved { session } => {
                self.registry.lookup(&session, caller)?;
                self.registry.mark_saved(&session)?;
                Ok(Response::Bool(true))
            }
            Request::SessionMarkUnsaved { session } => {
                self.registry.lookup(&session, caller)?;
                self.registry.mark_unsaved(&session)?;
                Ok(Response::Bool(true))
            }
            Request::Commit {
                session,
                comment,
                debug,
            } => {
                let text = self.commit(caller, session, comment, debug, None).await?;
                Ok(Response::Text(text))
            }
            Request::CommitConfirm {
                session,
                comment,
                debug,
                timeout_minutes,
            } => {
                let timeout = Duration::from_secs(u64::from(timeout_minutes) * 60);
                let text = self
                    .commit(caller, session, comment, debug, Some(timeout))
                    .await?;
                Ok(Response::Text(text))
            }
            Request::Confirm { session } => {
                let revision = self.scheduler.confirm(None)?;
                info!(session = %session, revision = revision.value(), "Commit confirmed");
                Ok(Response::Text(format!(
                    "Commit confirmed; revision {revision} is now permanent."
                )))
            }
            Request::ConfirmSilent { session } => {
                let accepted = self.scheduler.confirm_silent();
                debug!(session = %session, accepted, "Silent confirm");
                Ok(Response::Text(if accepted {
                    "Pending confirmed commit accepted.".to_string()
                } else {
                    "No confirmed commit pending.".to_string()
                }))
            }
            Request::ConfirmPersistId { persist_id } => {
                let revision = self.scheduler.confirm(Some(&persist_id))?;
                Ok(Response::Text(format!(
                    "Commit {persist_id} confirmed; revision {revision} is now permanent."
                )))
            }
            Request::CancelCommit {
                session,
                comment,
                persist_id,
                force,
                debug,
            } => {
                self.cancel_commit(caller, session, comment, persist_id, force, debug)
                    .await
            }
            Request::Rollback {
                session,
                revision,
                comment,
                debug,
            } => self.rollback(caller, session, revision, comment, debug).await,
            Request::GetCommitLog => {
                let map: BTreeMap<u64, String> = self
                    .log
                    .list()
                    .iter()
                    .map(|rev| (rev.number.value(), rev.describe()))
                    .collect();
                Ok(Response::CommitLog(map))
            }
        }
    }

    /// Attach-or-create. Returns `Bool(true)` when a new session was
    /// created, `Bool(false)` when an existing one was attached.
    async fn session_setup(&self, caller: &Caller, session: SessionId) -> ConfdResult<Response> {
        match self.registry.lookup(&session, caller) {
            Ok(_) => Ok(Response::Bool(false)),
            Err(ConfdError::SessionNotFound { .. }) => {
                self.registry.create_with_id(session, caller.uid).await?;
                Ok(Response::Bool(true))
            }
            Err(e) => Err(e),
        }
    }

    async fn session_teardown(&self, caller: &Caller, session: SessionId) -> ConfdResult<Response> {
        self.registry.lookup(&session, caller)?;

        // A session cannot be torn down mid-commit: its candidate is being
        // applied under the lock it still holds.
        if let Some(holder) = self.lock.holder() {
            if holder.holder == format!("commit:{session}") {
                return Err(ConfdError::LockBusy {
                    kind: holder.kind,
                    holder: holder.holder,
                });
            }
        }

        self.registry.teardown(&session).await?;
        Ok(Response::Bool(true))
    }

    /// Shared commit path; `confirm_timeout` turns it into a confirmed
    /// commit.
    #[instrument(skip(self, caller, comment), fields(session = %session))]
    async fn commit(
        &self,
        caller: &Caller,
        session: SessionId,
        comment: String,
        debug_flag: bool,
        confirm_timeout: Option<Duration>,
    ) -> ConfdResult<String> {
        let verbose = debug_flag || self.debug.is_enabled(areas::COMMIT);

        // Best-effort: a stale pending confirm is implicitly accepted so it
        // never collides with this commit.
        let _ = self.scheduler.confirm_silent();

        let record = self.registry.lookup(&session, caller)?;
        let _guard = self
            .lock
            .acquire_scoped(LockKind::Commit, format!("commit:{session}"))?;

        if verbose {
            debug!(candidate = %record.candidate, "Validating candidate");
        }
        self.validator.validate(&record.candidate).await?;

        // For a confirmed commit the pre-commit state is captured first;
        // that snapshot is what the timer or a cancel rolls back to.
        let prior = match confirm_timeout {
            Some(_) => Some(self.store.snapshot_running().await?),
            None => None,
        };

        if verbose {
            debug!(candidate = %record.candidate, "Applying candidate");
        }
        self.applier.apply_candidate(&record.candidate).await?;

        let snapshot = self.store.snapshot_running().await?;
        let log_comment = if comment.is_empty() {
            format!("commit by session {session}")
        } else {
            comment.clone()
        };
        let revision = self.log.append(log_comment, snapshot).await?;
        self.registry.mark_saved(&session)?;

        match (confirm_timeout, prior) {
            (Some(timeout), Some(prior)) => {
                // Still holding the commit lock, so no second commit can
                // start before the pending entry exists.
                let persist_id = self.scheduler.schedule(
                    None,
                    &session,
                    record.owner_uid,
                    timeout,
                    prior,
                    comment.as_str(),
                    revision,
                )?;
                let minutes = timeout.as_secs() / 60;
                Ok(format!(
                    "Commit complete; revision {revision}. Automatic rollback in \
                     {minutes} minute(s) unless confirmed (persist-id {persist_id})."
                ))
            }
            _ => Ok(format!("Commit complete; revision {revision}.")),
        }
    }

    async fn cancel_commit(
        &self,
        caller: &Caller,
        session: SessionId,
        comment: String,
        persist_id: Option<PersistId>,
        force: bool,
        debug_flag: bool,
    ) -> ConfdResult<Response> {
        if debug_flag || self.debug.is_enabled(areas::CONFIRM) {
            debug!(session = %session, force, "Cancelling confirmed commit");
        }
        let revision = self
            .scheduler
            .cancel(persist_id.as_ref(), &comment, caller, force)
            .await?;
        Ok(Response::Text(format!(
            "Confirmed commit cancelled; rolled back to prior configuration (revision {revision})."
        )))
    }

    #[instrument(skip(self, caller, comment), fields(session = %session, revision = revision.value()))]
    async fn rollback(
        &self,
        caller: &Caller,
        session: SessionId,
        revision: RevisionId,
        comment: String,
        debug_flag: bool,
    ) -> ConfdResult<Response> {
        let verbose = debug_flag || self.debug.is_enabled(areas::COMMIT);

        // Same protocol as commit: a pending confirm is silently accepted
        // before the rollback replaces the running config.
        let _ = self.scheduler.confirm_silent();

        self.registry.lookup(&session, caller)?;
        let _guard = self
            .lock
            .acquire_scoped(LockKind::Commit, format!("rollback:{session}"))?;

        let target = self.log.get(revision)?;
        if verbose {
            debug!(snapshot = %target.snapshot, "Applying revision snapshot");
        }
        self.applier.apply_snapshot(&target.snapshot).await?;

        let log_comment = if comment.is_empty() {
            format!("rollback to revision {revision}")
        } else {
            comment
        };
        let new_revision = self.log.append(log_comment, target.snapshot.clone()).await?;

        info!(
            session = %session,
            target = revision.value(),
            revision = new_revision.value(),
            "Rollback complete"
        );
        Ok(Response::Text(format!(
            "Rolled back to revision {revision}; new revision {new_revision}."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_accessors() {
        assert_eq!(Response::Bool(true).as_bool(), Some(true));
        assert_eq!(Response::Bool(true).as_text(), None);

        let text = Response::Text("ok".to_string());
        assert_eq!(text.as_text(), Some("ok"));
        assert_eq!(text.as_bool(), None);

        let log = Response::CommitLog(BTreeMap::new());
        assert!(log.as_commit_log().is_some());
        assert!(log.as_text().is_none());
    }
}
