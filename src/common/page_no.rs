//! Page number type.

use std::fmt;

/// Identifies a page in the page file.
///
/// Page numbers are 1-based: page `N` lives at byte offset `(N - 1) × PAGE_SIZE`.
/// Page 1 is reserved for the shutdown stamps, data pages start at 2.
///
/// # Example
/// ```
/// use versadb::PageNo;
///
/// let page_no = PageNo::new(42);
/// assert!(page_no.is_valid());
/// assert_eq!(page_no.file_offset(), 41 * 8192);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageNo(pub u32);

impl PageNo {
    /// Sentinel for "no page". Page numbering starts at 1.
    pub const INVALID: PageNo = PageNo(0);

    /// The page holding the open/close stamps.
    pub const ONE: PageNo = PageNo(1);

    /// Create a new PageNo.
    #[inline]
    pub fn new(no: u32) -> Self {
        PageNo(no)
    }

    /// Check if this page number is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Byte offset of this page in the page file.
    #[inline]
    pub fn file_offset(&self) -> u64 {
        (self.0 as u64 - 1) * crate::common::config::PAGE_SIZE as u64
    }
}

impl fmt::Display for PageNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_no_invalid() {
        assert!(!PageNo::INVALID.is_valid());
        assert!(PageNo::ONE.is_valid());
    }

    #[test]
    fn test_page_no_offset() {
        assert_eq!(PageNo::ONE.file_offset(), 0);
        assert_eq!(PageNo::new(3).file_offset(), 2 * 8192);
    }

    #[test]
    fn test_page_no_display() {
        assert_eq!(format!("{}", PageNo::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageNo::INVALID), "Page(INVALID)");
    }
}
