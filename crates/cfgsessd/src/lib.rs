//! cfgsessd - configuration session and commit daemon for confd
//!
//! Turns client requests into operations against the confd core: session
//! lifecycle, transactional commits under the global commit lock, and
//! confirmed commits with timer-driven automatic rollback.

mod dispatch;
mod log_store;
mod memory_store;

pub use dispatch::{Dispatcher, Request, Response};
pub use log_store::FileCommitLogStore;
pub use memory_store::{AcceptAllValidator, MemoryConfigStore};
