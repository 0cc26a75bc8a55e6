//! Confirmed-commit scheduling.
//!
//! A confirmed commit is committed immediately but reverts on its own
//! unless explicitly confirmed within a timeout. This module owns the
//! single pending-confirm slot, the deferred rollback timer, and the
//! confirm/cancel/silent-confirm transitions:
//!
//! ```text
//! Idle --schedule--> Pending --confirm / cancel / silent / expiry--> Idle
//! ```
//!
//! Timer cancellation and timer firing are inherently racy, so a fired
//! timer never trusts that it is still wanted: each pending confirm gets a
//! generation number, and the timer handler re-checks it under the state
//! mutex before touching the configuration. Aborting the timer task on
//! confirm/cancel is only an optimization.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use confd_types::{PersistId, RevisionId, SessionId, SnapshotRef, Uid};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{error, info, warn};

use crate::commit_log::CommitLog;
use crate::error::{ConfdError, ConfdResult};
use crate::lock::{CommitLockService, LockKind};
use crate::session::Caller;
use crate::store::Applier;

/// The pending confirmed commit. At most one exists system-wide.
#[derive(Debug, Clone)]
pub struct PendingConfirm {
    /// Token addressing this confirm from any process.
    pub persist_id: PersistId,
    /// Session that issued the confirmed commit.
    pub owner_session: SessionId,
    /// Uid that issued the confirmed commit; cancellation authorization is
    /// checked against this even after the session is gone.
    pub owner_uid: Uid,
    /// When the automatic rollback fires.
    pub deadline: Instant,
    /// Wall-clock deadline for operator-facing messages.
    pub deadline_utc: DateTime<Utc>,
    /// Running-config snapshot taken immediately before the commit.
    pub prior_snapshot: SnapshotRef,
    /// Comment of the confirmed commit.
    pub comment: String,
    /// The revision the confirmed commit produced.
    pub revision: RevisionId,
    /// Epoch counter; a fired timer acts only if this still matches.
    generation: u64,
}

struct PendingState {
    entry: PendingConfirm,
    timer: JoinHandle<()>,
}

/// Manages the single outstanding confirmed commit.
///
/// Constructed once at process start with handles to the commit lock, the
/// commit log and the external applier; the rollback paths (cancel and
/// timer expiry) go through the same lock discipline as ordinary commits.
pub struct ConfirmedCommitScheduler {
    lock: Arc<CommitLockService>,
    log: Arc<CommitLog>,
    applier: Arc<dyn Applier>,
    pending: Arc<Mutex<Option<PendingState>>>,
    generation: AtomicU64,
    persist_seq: AtomicU64,
}

impl ConfirmedCommitScheduler {
    /// Creates an idle scheduler.
    pub fn new(
        lock: Arc<CommitLockService>,
        log: Arc<CommitLog>,
        applier: Arc<dyn Applier>,
    ) -> Self {
        Self {
            lock,
            log,
            applier,
            pending: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            persist_seq: AtomicU64::new(0),
        }
    }

    /// Arms the deferred rollback for a just-committed confirmed commit.
    ///
    /// Called immediately after the commit's log append, while the caller
    /// still holds the commit lock, so no second commit can slip in before
    /// the pending entry exists. When `persist_id` is `None` one is
    /// generated as `<session-id>-c<N>`.
    ///
    /// The expected caller protocol silently accepts any previous confirm
    /// first, so `AlreadyPending` here signals a dispatcher bug rather
    /// than a situation to retry.
    pub fn schedule(
        &self,
        persist_id: Option<PersistId>,
        session: &SessionId,
        owner_uid: Uid,
        timeout: Duration,
        prior_snapshot: SnapshotRef,
        comment: impl Into<String>,
        revision: RevisionId,
    ) -> ConfdResult<PersistId> {
        let mut slot = self.pending.lock();
        if let Some(state) = slot.as_ref() {
            return Err(ConfdError::AlreadyPending {
                persist_id: state.entry.persist_id.clone(),
            });
        }

        let persist_id = persist_id.unwrap_or_else(|| {
            let seq = self.persist_seq.fetch_add(1, Ordering::SeqCst) + 1;
            PersistId::for_session(session, seq)
        });
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let deadline = Instant::now() + timeout;

        let entry = PendingConfirm {
            persist_id: persist_id.clone(),
            owner_session: session.clone(),
            owner_uid,
            deadline,
            deadline_utc: Utc::now() + chrono::Duration::seconds(timeout.as_secs() as i64),
            prior_snapshot,
            comment: comment.into(),
            revision,
            generation,
        };

        let timer = self.spawn_timer(deadline, generation);
        *slot = Some(PendingState {
            entry: entry.clone(),
            timer,
        });

        info!(
            persist_id = %persist_id,
            session = %session,
            revision = revision.value(),
            deadline = %entry.deadline_utc,
            "Scheduled confirmed-commit rollback"
        );
        Ok(persist_id)
    }

    /// Silently accepts the pending confirm, if any.
    ///
    /// Best-effort and idempotent: returns `true` if a pending confirm was
    /// accepted, `false` when there was nothing to accept. Invoked before
    /// every ordinary commit and every rollback so a stale pending confirm
    /// never collides with fresh work.
    pub fn confirm_silent(&self) -> bool {
        let state = self.pending.lock().take();
        match state {
            Some(state) => {
                state.timer.abort();
                info!(
                    persist_id = %state.entry.persist_id,
                    revision = state.entry.revision.value(),
                    "Silently accepted pending confirmed commit"
                );
                true
            }
            None => false,
        }
    }

    /// Confirms the pending commit: configuration is kept as committed.
    ///
    /// With `persist_id` of `None` this confirms whatever is pending;
    /// a supplied id must match the pending entry's. Returns the revision
    /// number that is now confirmed.
    pub fn confirm(&self, persist_id: Option<&PersistId>) -> ConfdResult<RevisionId> {
        let mut slot = self.pending.lock();
        let state = slot.take().ok_or(ConfdError::NoPendingConfirm)?;

        if let Some(supplied) = persist_id {
            if *supplied != state.entry.persist_id {
                // Leave the pending timer untouched.
                let supplied = supplied.clone();
                *slot = Some(state);
                return Err(ConfdError::PersistIdMismatch { supplied });
            }
        }
        drop(slot);
        state.timer.abort();

        info!(
            persist_id = %state.entry.persist_id,
            revision = state.entry.revision.value(),
            "Confirmed commit"
        );
        Ok(state.entry.revision)
    }

    /// Cancels the pending confirmed commit and rolls back immediately.
    ///
    /// The caller must own the confirming session or be superuser unless
    /// `force` is set; cancellation must sometimes be reachable from other
    /// sessions and processes. Appends a log entry documenting the
    /// cancellation and returns its revision number.
    pub async fn cancel(
        &self,
        persist_id: Option<&PersistId>,
        comment: &str,
        caller: &Caller,
        force: bool,
    ) -> ConfdResult<RevisionId> {
        let entry = {
            let mut slot = self.pending.lock();
            let state = slot.take().ok_or(ConfdError::NoPendingConfirm)?;

            if let Some(supplied) = persist_id {
                if *supplied != state.entry.persist_id {
                    let supplied = supplied.clone();
                    *slot = Some(state);
                    return Err(ConfdError::PersistIdMismatch { supplied });
                }
            }

            if !force && !caller.superuser && caller.uid != state.entry.owner_uid {
                let reason = format!(
                    "confirmed commit {} belongs to uid {}",
                    state.entry.persist_id, state.entry.owner_uid
                );
                *slot = Some(state);
                return Err(ConfdError::access_denied(reason));
            }

            state.timer.abort();
            state.entry
        };

        let log_comment = if comment.is_empty() {
            format!("confirmed commit {} cancelled", entry.persist_id)
        } else {
            format!("confirmed commit {} cancelled: {}", entry.persist_id, comment)
        };

        warn!(
            persist_id = %entry.persist_id,
            revision = entry.revision.value(),
            "Cancelling confirmed commit, rolling back"
        );
        Self::run_rollback(&self.lock, &self.log, self.applier.as_ref(), &entry, log_comment)
            .await
    }

    /// Returns a copy of the pending confirm, if any.
    pub fn pending(&self) -> Option<PendingConfirm> {
        self.pending.lock().as_ref().map(|state| state.entry.clone())
    }

    /// Returns true if a confirmed commit is pending.
    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn spawn_timer(&self, deadline: Instant, generation: u64) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending);
        let lock = Arc::clone(&self.lock);
        let log = Arc::clone(&self.log);
        let applier = Arc::clone(&self.applier);

        tokio::spawn(async move {
            sleep_until(deadline).await;

            // Atomic still-valid check: only act if the slot still holds
            // the confirm this timer was armed for.
            let entry = {
                let mut slot = pending.lock();
                match slot.take() {
                    Some(state) if state.entry.generation == generation => state.entry,
                    other => {
                        // Superseded by confirm/cancel (or replaced by a
                        // newer confirm); put it back and stand down.
                        *slot = other;
                        return;
                    }
                }
            };

            warn!(
                persist_id = %entry.persist_id,
                revision = entry.revision.value(),
                "Confirmed commit not confirmed in time, rolling back"
            );

            let comment = format!(
                "confirmed commit {} timed out, automatic rollback",
                entry.persist_id
            );
            // No client is attached to report to; a failure here is logged
            // and the confirm stays resolved. Retrying forever is not safe.
            match Self::run_rollback(&lock, &log, applier.as_ref(), &entry, comment).await {
                Ok(revision) => info!(
                    revision = revision.value(),
                    persist_id = %entry.persist_id,
                    "Automatic rollback complete"
                ),
                Err(e) => error!(
                    error = %e,
                    persist_id = %entry.persist_id,
                    "Automatic rollback failed; pending confirm abandoned"
                ),
            }
        })
    }

    async fn run_rollback(
        lock: &Arc<CommitLockService>,
        log: &CommitLog,
        applier: &dyn Applier,
        entry: &PendingConfirm,
        comment: String,
    ) -> ConfdResult<RevisionId> {
        let _guard = lock.acquire_scoped(
            LockKind::Commit,
            format!("confirmed-commit-rollback:{}", entry.persist_id),
        )?;
        applier.apply_snapshot(&entry.prior_snapshot).await?;
        log.append(comment, entry.prior_snapshot.clone()).await
    }
}
