//! PageFrame - an in-memory page.
//!
//! A [`PageFrame`] holds a [`Page`] plus the metadata the page store needs:
//! - Which page is loaded
//! - Dirty flag for write-back tracking
//!
//! Reference counting lives in the [`ObjectCache`](super::ObjectCache) that
//! owns the frame.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageNo;
use crate::storage::page::Page;

/// A cached page.
///
/// # Thread Safety
/// - `page`: `RwLock` for read/write synchronization
/// - `is_dirty`: `AtomicBool` for lock-free dirty tracking
pub struct PageFrame {
    page_no: PageNo,

    /// The page data, protected by RwLock.
    page: RwLock<Page>,

    /// Whether the page has been modified since it was last written.
    is_dirty: AtomicBool,
}

impl PageFrame {
    /// Wrap a page read from (or just written to) disk.
    pub fn new(page_no: PageNo, page: Page) -> Self {
        Self {
            page_no,
            page: RwLock::new(page),
            is_dirty: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Acquire read lock on the page.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page. The frame is marked dirty.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, Page> {
        self.mark_dirty();
        self.page.write()
    }

    /// Mark the frame as dirty (modified).
    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
    }

    /// Clear the dirty flag.
    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Check if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }
}
