//! versadb - An embedded transactional storage engine.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Store (store.rs)                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Transaction Layer (concurrency/)               │   │
//! │  │   VersionManager + LockManager + TidManager + visibility │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Data Layer (data/)                          │   │
//! │  │         DataManager + DataItem + ItemEdit                │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                 ↓                              ↓                │
//! │  ┌───────────────────────────────┐  ┌───────────────────────┐  │
//! │  │     Buffer (buffer/)          │  │  Recovery (recovery/) │  │
//! │  │ ObjectCache + PageStore       │  │  Wal + recover        │  │
//! │  └───────────────────────────────┘  └───────────────────────┘  │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │  DiskManager + Page layouts + FreeSpaceIndex + BootFile  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageNo, ItemId, Tid, Error, config)
//! - [`buffer`] - Reference-counted object cache and page cache
//! - [`storage`] - Disk I/O and page formats
//! - [`recovery`] - Write-ahead logging and crash recovery
//! - [`data`] - Variable-length items in data pages
//! - [`concurrency`] - Transactions, record locks and MVCC
//!
//! # Quick Start
//! ```no_run
//! use versadb::{Config, IsolationLevel, Store};
//!
//! let store = Store::open(Config {
//!     path: "my_store".into(),
//!     ..Default::default()
//! }).unwrap();
//!
//! let tid = store.begin(IsolationLevel::RepeatableRead).unwrap();
//! let id = store.insert(tid, b"record").unwrap();
//! store.commit(tid).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod data;
pub mod recovery;
pub mod storage;
mod store;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Config, ConflictKind, Error, ItemId, PageNo, Result, Tid, SUPER_TID};

pub use concurrency::IsolationLevel;
pub use store::{Store, BOOT_FILE, DB_FILE, LOG_FILE, TID_FILE};
