//! Free-Space Index - find a data page with at least N free bytes.

use parking_lot::Mutex;

use crate::common::config::{FREE_SPACE_INTERVALS, PAGE_SIZE};
use crate::common::PageNo;

/// Width of one bucket in bytes.
const INTERVAL: usize = PAGE_SIZE / FREE_SPACE_INTERVALS;

/// A page and the free bytes it had when it was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpace {
    pub page_no: PageNo,
    pub free: usize,
}

/// Buckets of pages keyed by free space.
///
/// Bucket `i` holds pages with `i × INTERVAL ≤ free < (i + 1) × INTERVAL`; the
/// last bucket also collects everything larger. A selected page is removed
/// from the index, so two inserts never race for the same page. The caller
/// adds it back with its new free space once the insert is done.
pub struct FreeSpaceIndex {
    buckets: Mutex<Vec<Vec<PageSpace>>>,
}

impl FreeSpaceIndex {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(vec![Vec::new(); FREE_SPACE_INTERVALS + 1]),
        }
    }

    /// Record that `page_no` has `free` bytes available.
    pub fn add(&self, page_no: PageNo, free: usize) {
        let bucket = (free / INTERVAL).min(FREE_SPACE_INTERVALS);
        self.buckets.lock()[bucket].push(PageSpace { page_no, free });
    }

    /// Remove and return a page with at least `needed` free bytes.
    ///
    /// Returns `None` when no indexed page fits; the caller should allocate a
    /// new page.
    pub fn select(&self, needed: usize) -> Option<PageSpace> {
        let start = needed.div_ceil(INTERVAL).min(FREE_SPACE_INTERVALS);
        let mut buckets = self.buckets.lock();

        for bucket in buckets[start..].iter_mut() {
            if let Some(pos) = bucket.iter().position(|p| p.free >= needed) {
                return Some(bucket.remove(pos));
            }
        }
        None
    }

    /// Number of indexed pages.
    pub fn len(&self) -> usize {
        self.buckets.lock().iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FreeSpaceIndex {
    fn default() -> Self {
        Self::new()
    }
}
