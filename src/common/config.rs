//! Configuration constants and store settings for versadb.

use std::path::PathBuf;

use super::{Error, Result};

/// Size of a page in bytes (8KB).
///
/// Every page in the page file is exactly this size; page `N` lives at
/// offset `(N - 1) × PAGE_SIZE`.
pub const PAGE_SIZE: usize = 8192;

/// Smallest page cache the data manager will run with.
pub const MIN_CACHED_PAGES: usize = 10;

/// Offset of the random open stamp in page 1.
pub const STAMP_OFFSET: usize = 100;

/// Length of each page-1 stamp.
pub const STAMP_LEN: usize = 8;

/// Number of intervals the free-space index splits a page into.
/// The index keeps one extra bucket for completely free pages.
pub const FREE_SPACE_INTERVALS: usize = 40;

/// How many times the data manager retries claiming a page for an insert.
pub const INSERT_RETRIES: usize = 5;

/// Default page cache budget (64 pages).
pub const DEFAULT_MEMORY: usize = 64 * PAGE_SIZE;

/// Configuration for opening or creating a store.
///
/// ```
/// let config = versadb::Config {
///     path: "my_store".into(),
///     memory: 1 << 20,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the page, log, tid and boot files.
    pub path: PathBuf,
    /// Bytes of memory the page cache may use. Divided by
    /// [`PAGE_SIZE`] to get the number of cached pages.
    pub memory: usize,
    /// Live data item limit. 0 means unbounded.
    pub item_cache_capacity: usize,
    /// Live version entry limit. 0 means unbounded.
    pub entry_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            path: "".into(),
            memory: DEFAULT_MEMORY,
            item_cache_capacity: 0,
            entry_cache_capacity: 0,
        }
    }
}

impl Config {
    /// Number of pages the page cache may hold.
    pub fn page_capacity(&self) -> usize {
        self.memory / PAGE_SIZE
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("Config's path must be set".into()));
        }

        let pages = self.page_capacity();
        if pages < MIN_CACHED_PAGES {
            return Err(Error::MemoryTooSmall {
                pages,
                minimum: MIN_CACHED_PAGES,
            });
        }

        Ok(())
    }
}
