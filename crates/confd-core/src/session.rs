//! Session registry.
//!
//! A session is a stateful handle to a candidate configuration: it is owned
//! by a user, optionally shared, and carries dirty/saved flags that the
//! dispatcher consults before commit. The registry owns the `Session`
//! records; candidate *contents* stay in the external config store, which
//! serializes edits under its own discipline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use confd_types::{CandidateHandle, SessionId, Uid};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{ConfdError, ConfdResult};
use crate::store::ConfigStore;

/// Identity attached to every dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Numeric user id of the caller.
    pub uid: Uid,
    /// True if the caller may bypass session ownership checks.
    pub superuser: bool,
}

impl Caller {
    /// Creates an ordinary caller.
    pub fn new(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            superuser: false,
        }
    }

    /// Creates a superuser caller.
    pub fn superuser(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            superuser: true,
        }
    }
}

/// One configuration session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session id.
    pub id: SessionId,
    /// Uid of the creating user.
    pub owner_uid: Uid,
    /// Shared sessions are visible to any caller that knows the id.
    pub shared: bool,
    /// Handle to the candidate held by the external config store.
    pub candidate: CandidateHandle,
    /// True once the candidate diverges from its last committed state.
    pub changed: bool,
    /// True once the candidate has been committed or explicitly saved.
    pub saved: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Returns true if the caller may see this session.
    pub fn visible_to(&self, caller: &Caller) -> bool {
        self.shared || caller.superuser || self.owner_uid == caller.uid
    }
}

/// Registry of all live sessions.
///
/// Metadata mutation is atomic per session: one mutex guards the id-keyed
/// map, and no await point ever sits inside it.
pub struct SessionRegistry {
    store: Arc<dyn ConfigStore>,
    sessions: Mutex<HashMap<SessionId, Session>>,
    next_generated: AtomicU64,
}

impl SessionRegistry {
    /// Creates an empty registry over the given config store.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
            next_generated: AtomicU64::new(0),
        }
    }

    /// Creates a fresh private session with a generated id.
    pub async fn create(&self, owner_uid: Uid) -> ConfdResult<SessionId> {
        let seq = self.next_generated.fetch_add(1, Ordering::SeqCst);
        let id = SessionId::new(format!("sess-{seq}"))
            .map_err(|e| ConfdError::internal(e.to_string()))?;
        self.create_with_id(id.clone(), owner_uid).await?;
        Ok(id)
    }

    /// Creates a fresh private session under a client-chosen id.
    ///
    /// Allocates the candidate from the config store first; if the id was
    /// taken concurrently the candidate is released again and the call
    /// fails.
    pub async fn create_with_id(&self, id: SessionId, owner_uid: Uid) -> ConfdResult<()> {
        if self.sessions.lock().contains_key(&id) {
            return Err(ConfdError::internal(format!(
                "session id '{id}' already in use"
            )));
        }

        let candidate = self.store.allocate_candidate().await?;

        let session = Session {
            id: id.clone(),
            owner_uid,
            shared: false,
            candidate: candidate.clone(),
            changed: false,
            saved: true,
            created_at: Utc::now(),
        };

        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&id) {
            drop(sessions);
            // Lost the race while allocating; hand the candidate back.
            let _ = self.store.release_candidate(&candidate).await;
            return Err(ConfdError::internal(format!(
                "session id '{id}' already in use"
            )));
        }
        sessions.insert(id.clone(), session);
        drop(sessions);

        info!(session = %id, owner = %owner_uid, "Created session");
        Ok(())
    }

    /// Returns the session if the caller may see it.
    ///
    /// A private session is visible only to its owner or a superuser; any
    /// other caller gets `AccessDenied`, not `SessionNotFound`, so probing
    /// cannot distinguish "hidden" from "missing" by error detail alone.
    pub fn lookup(&self, id: &SessionId, caller: &Caller) -> ConfdResult<Session> {
        let sessions = self.sessions.lock();
        let session = sessions
            .get(id)
            .ok_or_else(|| ConfdError::session_not_found(id.clone()))?;

        if !session.visible_to(caller) {
            debug!(session = %id, caller = %caller.uid, "Session lookup denied");
            return Err(ConfdError::access_denied(format!(
                "session '{id}' is private to another user"
            )));
        }
        Ok(session.clone())
    }

    /// Returns true if a session with the given id exists, regardless of
    /// visibility.
    pub fn exists(&self, id: &SessionId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Marks the session shared or private.
    pub fn set_shared(&self, id: &SessionId, shared: bool) -> ConfdResult<()> {
        self.with_session(id, |session| session.shared = shared)
    }

    /// Destroys the session and releases its candidate.
    ///
    /// Must not be called while the session holds the commit lock; the
    /// dispatcher enforces that.
    pub async fn teardown(&self, id: &SessionId) -> ConfdResult<()> {
        let session = self
            .sessions
            .lock()
            .remove(id)
            .ok_or_else(|| ConfdError::session_not_found(id.clone()))?;

        self.store.release_candidate(&session.candidate).await?;
        info!(session = %id, "Tore down session");
        Ok(())
    }

    /// Marks the candidate as diverged from its committed state.
    pub fn mark_changed(&self, id: &SessionId) -> ConfdResult<()> {
        self.with_session(id, |session| session.changed = true)
    }

    /// Marks the session saved: `saved = true`, `changed = false`.
    pub fn mark_saved(&self, id: &SessionId) -> ConfdResult<()> {
        self.with_session(id, |session| {
            session.saved = true;
            session.changed = false;
        })
    }

    /// Clears the saved flag.
    pub fn mark_unsaved(&self, id: &SessionId) -> ConfdResult<()> {
        self.with_session(id, |session| session.saved = false)
    }

    /// Returns the changed flag.
    pub fn is_changed(&self, id: &SessionId) -> ConfdResult<bool> {
        self.read_session(id, |session| session.changed)
    }

    /// Returns the saved flag.
    pub fn is_saved(&self, id: &SessionId) -> ConfdResult<bool> {
        self.read_session(id, |session| session.saved)
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns true if no sessions exist.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn with_session(
        &self,
        id: &SessionId,
        mutate: impl FnOnce(&mut Session),
    ) -> ConfdResult<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ConfdError::session_not_found(id.clone()))?;
        mutate(session);
        Ok(())
    }

    fn read_session<T>(
        &self,
        id: &SessionId,
        read: impl FnOnce(&Session) -> T,
    ) -> ConfdResult<T> {
        let sessions = self.sessions.lock();
        let session = sessions
            .get(id)
            .ok_or_else(|| ConfdError::session_not_found(id.clone()))?;
        Ok(read(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as PlMutex;
    use pretty_assertions::assert_eq;

    /// Config store that tracks allocations and releases.
    #[derive(Default)]
    struct TestStore {
        allocated: PlMutex<Vec<CandidateHandle>>,
        released: PlMutex<Vec<CandidateHandle>>,
    }

    #[async_trait]
    impl ConfigStore for TestStore {
        async fn allocate_candidate(&self) -> ConfdResult<CandidateHandle> {
            let handle = CandidateHandle::generate();
            self.allocated.lock().push(handle.clone());
            Ok(handle)
        }

        async fn release_candidate(&self, candidate: &CandidateHandle) -> ConfdResult<()> {
            self.released.lock().push(candidate.clone());
            Ok(())
        }

        async fn snapshot_running(&self) -> ConfdResult<confd_types::SnapshotRef> {
            Ok(confd_types::SnapshotRef::generate())
        }
    }

    fn registry() -> (Arc<TestStore>, SessionRegistry) {
        let store = Arc::new(TestStore::default());
        let reg = SessionRegistry::new(store.clone());
        (store, reg)
    }

    fn sid(s: &str) -> SessionId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_owner() {
        let (store, reg) = registry();
        let owner = Caller::new(100u32);

        reg.create_with_id(sid("cli-tty1"), owner.uid).await.unwrap();
        assert_eq!(store.allocated.lock().len(), 1);

        let session = reg.lookup(&sid("cli-tty1"), &owner).unwrap();
        assert_eq!(session.owner_uid, Uid::new(100));
        assert!(!session.shared);
        assert!(!session.changed);
        assert!(session.saved);
    }

    #[tokio::test]
    async fn test_private_session_visibility() {
        let (_store, reg) = registry();
        reg.create_with_id(sid("cli-tty1"), Uid::new(100)).await.unwrap();

        // Other uid is denied.
        let err = reg.lookup(&sid("cli-tty1"), &Caller::new(200u32)).unwrap_err();
        assert!(matches!(err, ConfdError::AccessDenied { .. }));

        // Superuser and owner both see it.
        assert!(reg.lookup(&sid("cli-tty1"), &Caller::superuser(200u32)).is_ok());
        assert!(reg.lookup(&sid("cli-tty1"), &Caller::new(100u32)).is_ok());
    }

    #[tokio::test]
    async fn test_shared_session_visible_to_all() {
        let (_store, reg) = registry();
        reg.create_with_id(sid("build"), Uid::new(100)).await.unwrap();
        reg.set_shared(&sid("build"), true).unwrap();

        assert!(reg.lookup(&sid("build"), &Caller::new(200u32)).is_ok());
    }

    #[tokio::test]
    async fn test_lookup_missing_session() {
        let (_store, reg) = registry();
        let err = reg.lookup(&sid("nope"), &Caller::new(100u32)).unwrap_err();
        assert!(matches!(err, ConfdError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (_store, reg) = registry();
        reg.create_with_id(sid("cli-tty1"), Uid::new(100)).await.unwrap();
        assert!(reg
            .create_with_id(sid("cli-tty1"), Uid::new(100))
            .await
            .is_err());
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn test_generated_ids_unique() {
        let (_store, reg) = registry();
        let a = reg.create(Uid::new(100)).await.unwrap();
        let b = reg.create(Uid::new(100)).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[tokio::test]
    async fn test_flag_lifecycle() {
        let (_store, reg) = registry();
        let id = sid("cli-tty1");
        reg.create_with_id(id.clone(), Uid::new(100)).await.unwrap();

        // An edit dirties the candidate.
        reg.mark_changed(&id).unwrap();
        assert!(reg.is_changed(&id).unwrap());

        // Commit marks saved and clears changed.
        reg.mark_saved(&id).unwrap();
        assert!(!reg.is_changed(&id).unwrap());
        assert!(reg.is_saved(&id).unwrap());

        reg.mark_unsaved(&id).unwrap();
        assert!(!reg.is_saved(&id).unwrap());
    }

    #[tokio::test]
    async fn test_teardown_releases_candidate() {
        let (store, reg) = registry();
        let id = sid("cli-tty1");
        reg.create_with_id(id.clone(), Uid::new(100)).await.unwrap();

        reg.teardown(&id).await.unwrap();
        assert!(!reg.exists(&id));
        assert_eq!(store.released.lock().len(), 1);
        assert_eq!(store.released.lock()[0], store.allocated.lock()[0]);

        assert!(matches!(
            reg.teardown(&id).await,
            Err(ConfdError::SessionNotFound { .. })
        ));
    }
}
