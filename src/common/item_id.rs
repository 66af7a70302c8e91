//! Data item identifier type.

use std::fmt;

use super::PageNo;

/// Identifies a data item: `page_no << 16 | offset_in_page`.
///
/// Ids stay stable for the whole life of the item because offsets inside a
/// page never move.
///
/// # Example
/// ```
/// use versadb::{ItemId, PageNo};
///
/// let id = ItemId::new(PageNo::new(3), 130);
/// assert_eq!(id.page_no(), PageNo::new(3));
/// assert_eq!(id.offset(), 130);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Pack a page number and in-page offset.
    #[inline]
    pub fn new(page_no: PageNo, offset: u16) -> Self {
        ItemId(((page_no.0 as u64) << 16) | offset as u64)
    }

    /// Page holding the item.
    #[inline]
    pub fn page_no(&self) -> PageNo {
        PageNo((self.0 >> 16) as u32)
    }

    /// Byte offset of the item inside its page.
    #[inline]
    pub fn offset(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item({}:{})", self.page_no().0, self.offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_pack_unpack() {
        let id = ItemId::new(PageNo::new(70_000), 8189);
        assert_eq!(id.page_no(), PageNo::new(70_000));
        assert_eq!(id.offset(), 8189);
    }

    #[test]
    fn test_item_id_layout() {
        assert_eq!(ItemId::new(PageNo::new(2), 2).0, (2 << 16) | 2);
    }

    #[test]
    fn test_item_id_display() {
        assert_eq!(format!("{}", ItemId::new(PageNo::new(5), 10)), "Item(5:10)");
    }
}
