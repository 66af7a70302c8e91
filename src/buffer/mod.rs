//! Buffer layer - reference-counted caching.
//!
//! Every in-memory object in the engine (pages, data items, version entries)
//! is held in an [`ObjectCache`]. This module also holds the page layer built
//! on it.
//!
//! # Components
//! - [`ObjectCache`] - Generic reference-counted cache with caller-supplied load/evict
//! - [`PageStore`] - Page cache over the page file
//! - [`PageFrame`] - A cached page + dirty flag
//! - [`PageGuard`] - RAII guard that releases a page on drop
//! - [`CacheStats`] - Hit/miss/eviction counters

mod frame;
mod object_cache;
mod page_guard;
mod page_store;
mod stats;

pub use frame::PageFrame;
pub use object_cache::ObjectCache;
pub use page_guard::PageGuard;
pub use page_store::PageStore;
pub use stats::{CacheStats, StatsSnapshot};
