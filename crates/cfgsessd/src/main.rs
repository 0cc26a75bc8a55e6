//! cfgsessd - Configuration Session Daemon
//!
//! Entry point: constructs the core services, restores the commit log
//! from disk, and runs until shutdown. The RPC transport that feeds the
//! dispatcher attaches here; until it is wired in the daemon runs the
//! control plane standalone.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use confd_core::{
    CommitLockService, CommitLog, ConfirmedCommitScheduler, DebugSettings, SessionRegistry,
};

use cfgsessd::{AcceptAllValidator, Dispatcher, FileCommitLogStore, MemoryConfigStore};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "cfgsessd", about = "confd configuration session daemon")]
struct Args {
    /// Path of the durable commit log.
    #[arg(long, default_value = "commit-log.jsonl")]
    commit_log: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Debug areas to enable at startup (commit, session, confirm).
    #[arg(long = "debug", value_name = "AREA")]
    debug: Vec<String>,
}

/// Initializes tracing/logging subsystem
fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    info!("--- Starting cfgsessd ---");

    // Collaborators: in-process config store and file-backed commit log
    // until the external engines are attached.
    let store = Arc::new(MemoryConfigStore::new());
    let validator = Arc::new(AcceptAllValidator);
    let log_store = Arc::new(FileCommitLogStore::new(&args.commit_log));

    // Core services, constructed once and passed by handle.
    let lock = Arc::new(CommitLockService::new());
    let log = Arc::new(CommitLog::new(log_store));
    log.restore().await?;

    let scheduler = Arc::new(ConfirmedCommitScheduler::new(
        Arc::clone(&lock),
        Arc::clone(&log),
        store.clone(),
    ));
    let registry = Arc::new(SessionRegistry::new(store.clone()));
    let debug = Arc::new(DebugSettings::with_areas(args.debug));

    let _dispatcher = Dispatcher::new(
        registry,
        Arc::clone(&lock),
        Arc::clone(&log),
        scheduler,
        store.clone(),
        validator,
        store,
        debug,
    );

    info!(
        commit_log = %args.commit_log.display(),
        revisions = log.len(),
        "cfgsessd initialization complete"
    );

    // A pending confirmed commit does not survive restart: nothing is
    // re-armed here, and the running config file still reflects the last
    // confirmed state (implicit rollback on restart).
    signal::ctrl_c().await?;
    info!("cfgsessd: Received shutdown signal, exiting");

    Ok(())
}
