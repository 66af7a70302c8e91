//! Page - the fundamental 8KB unit of storage.
//!
//! A [`Page`] is a raw 8KB byte array that serves as the unit of I/O
//! between disk and memory. Cached pages live inside a
//! [`PageFrame`](crate::buffer::PageFrame).

use crate::common::config::PAGE_SIZE;

/// A page of data (8KB, 4KB-aligned).
///
/// The layout of the bytes depends on the page:
/// - page 1 carries the shutdown stamps (see [`page_one`](super::page_one))
/// - every other page is a data page (see [`data_page`](super::data_page))
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code; copying 8KB should be
/// explicit. A `#[cfg(test)]` Clone is provided for tests.
///
/// # Example
/// ```
/// use versadb::storage::page::Page;
///
/// let mut page = Page::new();
/// page.as_mut_slice()[0] = 0xFF;
/// assert_eq!(page.as_slice()[0], 0xFF);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Create a page from initial bytes; the rest of the page is zeroed.
    ///
    /// # Panics
    /// Panics if `bytes` is longer than a page.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= PAGE_SIZE, "initial bytes exceed page size");
        let mut page = Self::new();
        page.data[..bytes.len()].copy_from_slice(bytes);
        page
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Get the size of a page.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        Page::from_bytes(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_and_alignment() {
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<Page>(), 4096);
    }

    #[test]
    fn test_page_from_bytes() {
        let page = Page::from_bytes(&[1, 2, 3]);
        assert_eq!(&page.as_slice()[..4], &[1, 2, 3, 0]);
        assert_eq!(page.as_slice()[PAGE_SIZE - 1], 0);
    }

    #[test]
    fn test_page_reset() {
        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xFF;
        page.as_mut_slice()[8191] = 0xAB;

        page.reset();

        assert_eq!(page.as_slice()[0], 0);
        assert_eq!(page.as_slice()[8191], 0);
    }

    #[test]
    fn test_page_clone_in_tests() {
        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xAB;

        let cloned = page.clone();
        assert_eq!(cloned.as_slice()[0], 0xAB);
    }
}
