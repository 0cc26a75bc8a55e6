//! Operation-level dispatcher tests over the recording mocks.
//!
//! Where `commit_flows` asserts on configuration content, these tests
//! assert on the exact sequence of collaborator operations the dispatcher
//! drives: what gets applied, what gets released, and what never runs.

use std::sync::Arc;

use cfgsessd::{Dispatcher, Request};
use confd_core::ConfdError;
use confd_test::{callers, Applied, CoreFixture};
use confd_types::SessionId;
use pretty_assertions::assert_eq;

fn dispatcher(fx: &CoreFixture) -> Dispatcher {
    Dispatcher::new(
        Arc::clone(&fx.registry),
        Arc::clone(&fx.lock),
        Arc::clone(&fx.log),
        Arc::clone(&fx.scheduler),
        fx.store.clone(),
        fx.validator.clone(),
        fx.store.clone(),
        Arc::clone(&fx.debug),
    )
}

fn sid(s: &str) -> SessionId {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_commit_applies_exactly_the_session_candidate() {
    let fx = CoreFixture::new();
    let dispatcher = dispatcher(&fx);
    let operator = callers::operator();

    dispatcher
        .dispatch(&operator, Request::SessionSetup { session: sid("cli-tty1") })
        .await
        .unwrap();
    let candidate = fx.registry.lookup(&sid("cli-tty1"), &operator).unwrap().candidate;

    dispatcher
        .dispatch(
            &operator,
            Request::Commit {
                session: sid("cli-tty1"),
                comment: "change".to_string(),
                debug: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(fx.store.applied(), vec![Applied::Candidate(candidate)]);
    assert_eq!(fx.log.len(), 1);
}

#[tokio::test]
async fn test_rollback_applies_the_logged_snapshot() {
    let fx = CoreFixture::new();
    let dispatcher = dispatcher(&fx);
    let operator = callers::operator();

    dispatcher
        .dispatch(&operator, Request::SessionSetup { session: sid("cli-tty1") })
        .await
        .unwrap();
    dispatcher
        .dispatch(
            &operator,
            Request::Commit {
                session: sid("cli-tty1"),
                comment: "change".to_string(),
                debug: false,
            },
        )
        .await
        .unwrap();

    let logged_snapshot = fx.log.list()[0].snapshot.clone();
    dispatcher
        .dispatch(
            &operator,
            Request::Rollback {
                session: sid("cli-tty1"),
                revision: "1".parse().unwrap(),
                comment: String::new(),
                debug: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(fx.store.last_applied(), Some(Applied::Snapshot(logged_snapshot)));
}

#[tokio::test]
async fn test_apply_failure_reaches_caller_and_skips_log() {
    let fx = CoreFixture::new();
    let dispatcher = dispatcher(&fx);
    let operator = callers::operator();

    dispatcher
        .dispatch(&operator, Request::SessionSetup { session: sid("cli-tty1") })
        .await
        .unwrap();
    fx.store.fail_apply(true);

    let err = dispatcher
        .dispatch(
            &operator,
            Request::Commit {
                session: sid("cli-tty1"),
                comment: String::new(),
                debug: false,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ConfdError::ApplyFailed { .. }));
    assert!(fx.log.is_empty());
    assert!(!fx.lock.is_locked());
}

#[tokio::test]
async fn test_teardown_returns_candidate_to_store() {
    let fx = CoreFixture::new();
    let dispatcher = dispatcher(&fx);
    let operator = callers::operator();

    dispatcher
        .dispatch(&operator, Request::SessionSetup { session: sid("cli-tty1") })
        .await
        .unwrap();
    dispatcher
        .dispatch(&operator, Request::SessionTeardown { session: sid("cli-tty1") })
        .await
        .unwrap();

    assert_eq!(fx.store.released(), fx.store.allocated());
}
