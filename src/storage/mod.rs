//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level page file I/O
//! - [`page`] - Page types and layouts
//! - [`FreeSpaceIndex`] - Data pages bucketed by free space
//! - [`BootFile`] - Atomically replaced metadata blob

mod boot;
mod disk_manager;
mod free_space;
pub mod page;

pub use boot::BootFile;
pub use disk_manager::DiskManager;
pub use free_space::{FreeSpaceIndex, PageSpace};
