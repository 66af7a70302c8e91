//! Disk Manager - low-level file I/O for the page file.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Appending new pages
//! - Truncating the file during recovery

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageNo, Result};
use crate::storage::page::Page;

/// Manages disk I/O for the page file.
///
/// # File Layout
/// Pages are laid out sequentially and numbered from 1:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 1  │ Page 2  │ Page 3  │  ...    │ Page N  │
/// │ (8KB)   │ (8KB)   │ (8KB)   │         │ (8KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      8192    16384   ...   (N-1)×8192
/// ```
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The [`PageStore`](crate::buffer::PageStore)
/// serializes access with a `Mutex`.
///
/// # Durability
/// Every write is followed by `fsync()`.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new page file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
        })
    }

    /// Open an existing page file.
    ///
    /// A trailing partial page (torn append) is ignored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self { file, page_count })
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_no: PageNo) -> Result<Page> {
        self.check_exists(page_no)?;

        self.file.seek(SeekFrom::Start(page_no.file_offset()))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk and fsync.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_no: PageNo, page: &Page) -> Result<()> {
        self.check_exists(page_no)?;

        self.file.seek(SeekFrom::Start(page_no.file_offset()))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Append `page` as a new page and fsync. Returns its number.
    pub fn allocate_page(&mut self, page: &Page) -> Result<PageNo> {
        let page_no = PageNo::new(self.page_count + 1);

        self.file.seek(SeekFrom::Start(page_no.file_offset()))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        self.page_count += 1;
        Ok(page_no)
    }

    /// Discard every page after `max`.
    pub fn truncate(&mut self, max: PageNo) -> Result<()> {
        let len = max.0 as u64 * PAGE_SIZE as u64;
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.page_count = max.0;
        Ok(())
    }

    /// Flush file contents and metadata.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the page file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    fn check_exists(&self, page_no: PageNo) -> Result<()> {
        if !page_no.is_valid() || page_no.0 > self.page_count {
            return Err(Error::PageNotFound(page_no));
        }
        Ok(())
    }
}
