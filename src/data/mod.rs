//! Data layer - items stored in data pages.
//!
//! - [`DataManager`] - Insert, read and release items; owns the page store and log
//! - [`DataItem`] - A cached item view pinning its page
//! - [`ItemEdit`] - Scoped in-place edit that logs on commit and restores on drop

mod data_item;
mod data_manager;

pub use data_item::{set_raw_invalid, wrap_raw, DataItem, ItemEdit, ITEM_HEADER_SIZE};
pub use data_manager::DataManager;
