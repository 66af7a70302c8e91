//! Concurrency layer - transactions, record locks and MVCC.
//!
//! - [`TidManager`] - Durable transaction ids and their states
//! - [`LockManager`] - Exclusive record locks with deadlock detection
//! - [`VersionManager`] - Snapshot reads, inserts and deletes
//! - [`visibility`] - Which versions a transaction may see

mod lock_manager;
mod tid_manager;
mod transaction;
mod version_entry;
mod version_manager;
pub mod visibility;

pub use lock_manager::{LockManager, LockWait};
pub use tid_manager::TidManager;
pub use transaction::{IsolationLevel, Transaction};
pub use version_entry::VersionEntry;
pub use version_manager::VersionManager;
