//! Data page layout.
//!
//! Every page except page 1 is a data page:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       2     free space offset (FSO), little-endian u16
//! 2       ...   data items, densely packed, appended at FSO
//! ```
//!
//! The FSO only ever grows, so an item's offset never changes.

use crate::common::config::PAGE_SIZE;

use super::Page;

/// Size of the data page header.
pub const HEADER_SIZE: usize = 2;

/// Free bytes in an empty data page; also the largest wrapped item.
pub const MAX_FREE_SPACE: usize = PAGE_SIZE - HEADER_SIZE;

impl Page {
    /// Build an empty data page.
    pub fn new_data_page() -> Page {
        let mut page = Page::new();
        page.set_fso(HEADER_SIZE as u16);
        page
    }

    /// Current free space offset.
    pub fn fso(&self) -> u16 {
        let data = self.as_slice();
        u16::from_le_bytes([data[0], data[1]])
    }

    pub fn set_fso(&mut self, fso: u16) {
        self.as_mut_slice()[..HEADER_SIZE].copy_from_slice(&fso.to_le_bytes());
    }

    /// Bytes still available for new items.
    pub fn free_space(&self) -> usize {
        PAGE_SIZE - self.fso() as usize
    }

    /// Append `raw` at the FSO and return its offset.
    ///
    /// # Panics
    /// Panics if `raw` does not fit; callers check [`free_space`](Self::free_space).
    pub fn insert_data(&mut self, raw: &[u8]) -> u16 {
        let offset = self.fso();
        let start = offset as usize;
        assert!(start + raw.len() <= PAGE_SIZE, "item does not fit in page");

        self.as_mut_slice()[start..start + raw.len()].copy_from_slice(raw);
        self.set_fso((start + raw.len()) as u16);
        offset
    }

    /// Place `raw` at `offset` during recovery, growing the FSO to cover it.
    pub fn recover_insert(&mut self, raw: &[u8], offset: u16) {
        let end = offset as usize + raw.len();
        self.as_mut_slice()[offset as usize..end].copy_from_slice(raw);
        if (self.fso() as usize) < end {
            self.set_fso(end as u16);
        }
    }

    /// Overwrite `raw` at `offset` during recovery. The FSO is untouched.
    pub fn recover_update(&mut self, raw: &[u8], offset: u16) {
        let start = offset as usize;
        self.as_mut_slice()[start..start + raw.len()].copy_from_slice(raw);
    }
}
