//! Page Store - the page caching layer.
//!
//! The [`PageStore`] provides:
//! - Page caching between disk and memory through an [`ObjectCache`]
//! - Reference counting per page
//! - Write-back of dirty pages when their last reference is released
//! - Synchronously durable page creation

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::buffer::{CacheStats, ObjectCache, PageFrame, PageGuard};
use crate::common::config::MIN_CACHED_PAGES;
use crate::common::{Error, PageNo, Result};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Caches pages of one page file.
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────┐
/// │                     PageStore                     │
/// │  ┌──────────────────────────────┐  ┌───────────┐  │
/// │  │ ObjectCache<PageNo, Frame>   │  │disk_manager│ │
/// │  │ refs + in-flight loads       │─▶│   Mutex    │ │
/// │  └──────────────────────────────┘  └───────────┘  │
/// └───────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `cache`: its own `Mutex` over reference counts
/// - `disk_manager`: `Mutex` — serializes reads, flushes and allocation
///
/// # Usage
/// ```ignore
/// let store = PageStore::create("store.db", 64)?;
/// let page_no = store.new_page(&Page::new_data_page())?;
///
/// let guard = store.fetch(page_no)?;
/// guard.write().insert_data(b"hello");
/// // guard drops: last reference, dirty page flushed
/// ```
pub struct PageStore {
    cache: ObjectCache<PageNo, PageFrame>,
    disk_manager: Mutex<DiskManager>,
}

impl PageStore {
    /// Create a new page file with room for `capacity` cached pages.
    ///
    /// # Errors
    /// - `Error::MemoryTooSmall` if `capacity` is below the minimum
    /// - I/O errors, including when the file already exists
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        Self::check_capacity(capacity)?;
        let dm = DiskManager::create(path)?;
        Ok(Self::new(dm, capacity))
    }

    /// Open an existing page file.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        Self::check_capacity(capacity)?;
        let dm = DiskManager::open(path)?;
        info!(pages = dm.page_count(), capacity, "page file opened");
        Ok(Self::new(dm, capacity))
    }

    fn new(disk_manager: DiskManager, capacity: usize) -> Self {
        Self {
            cache: ObjectCache::new(capacity),
            disk_manager: Mutex::new(disk_manager),
        }
    }

    fn check_capacity(capacity: usize) -> Result<()> {
        if capacity < MIN_CACHED_PAGES {
            return Err(Error::MemoryTooSmall {
                pages: capacity,
                minimum: MIN_CACHED_PAGES,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Create pages
    // ========================================================================

    /// Append a new page holding `page` and fsync it before returning.
    ///
    /// The page is not cached; obtain it like any other page.
    pub fn new_page(&self, page: &Page) -> Result<PageNo> {
        let page_no = self.disk_manager.lock().allocate_page(page)?;
        debug!(%page_no, "page allocated");
        Ok(page_no)
    }

    // ========================================================================
    // Public API: Obtain and release
    // ========================================================================

    /// Get a reference to a cached page, reading it from disk on a miss.
    ///
    /// Pair every call with [`release_page`](Self::release_page).
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::CacheFull` if the cache is at capacity
    pub fn obtain_page(&self, page_no: PageNo) -> Result<Arc<PageFrame>> {
        self.cache.obtain(page_no, |page_no| {
            let page = self.disk_manager.lock().read_page(page_no)?;
            Ok(PageFrame::new(page_no, page))
        })
    }

    /// Drop one reference. A dirty page is flushed when the last one goes.
    pub fn release_page(&self, page_no: PageNo) -> Result<()> {
        self.cache
            .release(page_no, |_, frame| self.flush_frame(frame))
    }

    /// Get a scoped reference that is released on drop.
    pub fn fetch(&self, page_no: PageNo) -> Result<PageGuard<'_>> {
        let frame = self.obtain_page(page_no)?;
        Ok(PageGuard::new(self, frame))
    }

    // ========================================================================
    // Public API: Flush and truncate
    // ========================================================================

    /// Write a page to disk now if it is dirty.
    pub fn flush_page(&self, frame: &PageFrame) -> Result<()> {
        self.flush_frame(frame)
    }

    /// Discard every page after `max`. Only used by recovery, while no page
    /// beyond `max` is cached.
    pub fn truncate(&self, max: PageNo) -> Result<()> {
        let mut dm = self.disk_manager.lock();
        if dm.page_count() > max.0 {
            info!(from = dm.page_count(), to = max.0, "truncating page file");
        }
        dm.truncate(max)
    }

    /// Flush every cached page and sync the file.
    pub fn close(&self) -> Result<()> {
        let result = self.cache.drain(|_, frame| self.flush_frame(frame));
        self.disk_manager.lock().sync()?;
        result
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Number of pages in the page file.
    pub fn page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }

    /// References held on a cached page, or None if it isn't cached.
    pub fn pin_count(&self, page_no: PageNo) -> Option<usize> {
        self.cache.ref_count(page_no)
    }

    /// Get page cache statistics.
    pub fn stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    fn flush_frame(&self, frame: &PageFrame) -> Result<()> {
        if !frame.is_dirty() {
            return Ok(());
        }

        // Hold the page read lock while writing so a concurrent writer
        // can't tear the image.
        let page = frame.read();
        self.disk_manager.lock().write_page(frame.page_no(), &page)?;
        frame.clear_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Helper to create a page store with a temporary page file.
    fn create_test_store(capacity: usize) -> (PageStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        (PageStore::create(&path, capacity).unwrap(), dir)
    }

    #[test]
    fn test_capacity_minimum() {
        let dir = tempdir().unwrap();
        let result = PageStore::create(dir.path().join("test.db"), 9);
        assert!(matches!(result, Err(Error::MemoryTooSmall { .. })));
    }

    #[test]
    fn test_new_page_is_durable_and_numbered() {
        let (store, _dir) = create_test_store(10);

        let p1 = store.new_page(&Page::from_bytes(&[7])).unwrap();
        let p2 = store.new_page(&Page::new()).unwrap();
        assert_eq!(p1, PageNo::new(1));
        assert_eq!(p2, PageNo::new(2));
        assert_eq!(store.page_count(), 2);
        assert_eq!(store.cached_pages(), 0);

        let guard = store.fetch(p1).unwrap();
        assert_eq!(guard.read().as_slice()[0], 7);
    }

    #[test]
    fn test_release_flushes_dirty_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let store = PageStore::create(&path, 10).unwrap();
            let page_no = store.new_page(&Page::new()).unwrap();

            let frame = store.obtain_page(page_no).unwrap();
            frame.write().as_mut_slice()[10] = 0x42;
            assert!(frame.is_dirty());

            store.release_page(page_no).unwrap();
            assert!(!frame.is_dirty());
            assert_eq!(store.pin_count(page_no), None);
        }

        let store = PageStore::open(&path, 10).unwrap();
        let guard = store.fetch(PageNo::ONE).unwrap();
        assert_eq!(guard.read().as_slice()[10], 0x42);
    }

    #[test]
    fn test_ref_counting() {
        let (store, _dir) = create_test_store(10);
        let page_no = store.new_page(&Page::new()).unwrap();

        let a = store.fetch(page_no).unwrap();
        let b = store.fetch(page_no).unwrap();
        assert_eq!(store.pin_count(page_no), Some(2));

        drop(a);
        assert_eq!(store.pin_count(page_no), Some(1));
        b.release().unwrap();
        assert_eq!(store.pin_count(page_no), None);
    }

    #[test]
    fn test_cache_full() {
        let (store, _dir) = create_test_store(10);
        let pages: Vec<PageNo> = (0..11)
            .map(|_| store.new_page(&Page::new()).unwrap())
            .collect();

        let guards: Vec<_> = pages[..10]
            .iter()
            .map(|p| store.fetch(*p).unwrap())
            .collect();
        assert!(matches!(store.fetch(pages[10]), Err(Error::CacheFull)));

        drop(guards);
        assert!(store.fetch(pages[10]).is_ok());
    }

    #[test]
    fn test_page_not_found() {
        let (store, _dir) = create_test_store(10);
        assert!(matches!(
            store.fetch(PageNo::new(999)),
            Err(Error::PageNotFound(_))
        ));
        assert_eq!(store.cached_pages(), 0);
    }

    #[test]
    fn test_close_flushes_held_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let store = PageStore::create(&path, 10).unwrap();
            let page_no = store.new_page(&Page::new()).unwrap();
            let frame = store.obtain_page(page_no).unwrap();
            frame.write().as_mut_slice()[0] = 0x99;
            store.close().unwrap();
        }

        let store = PageStore::open(&path, 10).unwrap();
        assert_eq!(store.fetch(PageNo::ONE).unwrap().read().as_slice()[0], 0x99);
    }

    #[test]
    fn test_truncate() {
        let (store, _dir) = create_test_store(10);
        for _ in 0..4 {
            store.new_page(&Page::new()).unwrap();
        }
        store.truncate(PageNo::new(2)).unwrap();
        assert_eq!(store.page_count(), 2);
        assert!(store.fetch(PageNo::new(3)).is_err());
    }

    #[test]
    fn test_concurrent_fetch() {
        use std::thread;

        let (store, _dir) = create_test_store(10);
        let store = Arc::new(store);
        let page_no = store.new_page(&Page::from_bytes(&[0x42])).unwrap();

        let mut handles = vec![];
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let guard = store.fetch(page_no).unwrap();
                assert_eq!(guard.read().as_slice()[0], 0x42);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.pin_count(page_no), None);
    }
}
