//! Common types and utilities shared across versadb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and the store [`Config`]
//! - Error types
//! - Identifiers (PageNo, ItemId, Tid)

pub mod config;
pub mod error;
mod item_id;
mod page_no;

pub use config::Config;
pub use error::{ConflictKind, Error, Result};
pub use item_id::ItemId;
pub use page_no::PageNo;

/// Transaction identifier. Issued monotonically from 1.
pub type Tid = u64;

/// The reserved transaction: always committed, never active, sees everything.
pub const SUPER_TID: Tid = 0;
