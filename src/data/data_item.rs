//! Data items - variable-length records inside data pages.
//!
//! # Item Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     validity flag (0 = valid, 1 = invalid)
//! 1       2     payload length, little-endian
//! 3       ...   payload
//! ```
//!
//! An item lives inside its page's buffer. The cached [`DataItem`] holds a
//! reference to the page frame, released when the item leaves the cache.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::buffer::PageFrame;
use crate::common::{Error, ItemId, PageNo, Result, Tid};
use crate::recovery::{LogRecord, Wal};
use crate::storage::page::data_page::HEADER_SIZE;

/// Bytes before the payload.
pub const ITEM_HEADER_SIZE: usize = 3;

const VALID: u8 = 0;
const INVALID: u8 = 1;

/// Wrap a payload as a valid item: `[0][len][payload]`.
pub fn wrap_raw(payload: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(ITEM_HEADER_SIZE + payload.len());
    raw.push(VALID);
    raw.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    raw.extend_from_slice(payload);
    raw
}

/// Mark a wrapped item invalid in place.
pub fn set_raw_invalid(raw: &mut [u8]) {
    raw[0] = INVALID;
}

/// A cached view over one item in a page.
///
/// # Thread Safety
/// `lock` serializes edits against reads of the same item. Page bytes are
/// accessed through the frame's own `RwLock`, held only while copying.
pub struct DataItem {
    id: ItemId,
    frame: Arc<PageFrame>,
    /// Start of the item within the page.
    start: usize,
    /// Wrapped length, header included.
    len: usize,
    lock: RwLock<()>,
    wal: Arc<Wal>,
}

impl DataItem {
    /// Parse the item at `id` out of an obtained page.
    ///
    /// # Errors
    /// Returns `Error::InvalidItemId` if the offset doesn't land on an item
    /// inside the page's used region.
    pub(crate) fn load(id: ItemId, frame: Arc<PageFrame>, wal: Arc<Wal>) -> Result<Self> {
        let start = id.offset() as usize;
        let len = {
            let page = frame.read();
            let fso = page.fso() as usize;
            if start < HEADER_SIZE || start + ITEM_HEADER_SIZE > fso {
                return Err(Error::InvalidItemId(id));
            }
            let data = page.as_slice();
            let size = u16::from_le_bytes([data[start + 1], data[start + 2]]) as usize;
            if start + ITEM_HEADER_SIZE + size > fso {
                return Err(Error::InvalidItemId(id));
            }
            ITEM_HEADER_SIZE + size
        };

        Ok(Self {
            id,
            frame,
            start,
            len,
            lock: RwLock::new(()),
            wal,
        })
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn page_no(&self) -> PageNo {
        self.frame.page_no()
    }

    /// False once the item was rolled back by recovery.
    pub fn is_valid(&self) -> bool {
        let _item = self.lock.read();
        self.frame.read().as_slice()[self.start] == VALID
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.len - ITEM_HEADER_SIZE
    }

    /// Run `f` over the payload while holding the item's read lock.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let _item = self.lock.read();
        let page = self.frame.read();
        f(&page.as_slice()[self.start + ITEM_HEADER_SIZE..self.start + self.len])
    }

    /// Copy of the payload.
    pub fn data(&self) -> Vec<u8> {
        self.with_data(<[u8]>::to_vec)
    }

    /// Begin an in-place edit.
    ///
    /// The returned guard holds the item exclusively. Call
    /// [`ItemEdit::commit`] to log the change; dropping the guard without
    /// committing restores the original bytes.
    pub fn edit(&self) -> ItemEdit<'_> {
        let guard = self.lock.write();
        let old = self.raw();
        self.frame.mark_dirty();
        ItemEdit {
            item: self,
            _guard: guard,
            old,
            committed: false,
        }
    }

    fn raw(&self) -> Vec<u8> {
        self.frame.read().as_slice()[self.start..self.start + self.len].to_vec()
    }

    fn write_raw(&self, raw: &[u8]) {
        self.frame.write().as_mut_slice()[self.start..self.start + self.len].copy_from_slice(raw);
    }
}

/// An exclusive edit of one data item.
///
/// ```ignore
/// let mut edit = item.edit();
/// edit.update(|data| data[8..16].copy_from_slice(&tid.to_le_bytes()));
/// edit.commit(tid)?;
/// ```
pub struct ItemEdit<'a> {
    item: &'a DataItem,
    _guard: RwLockWriteGuard<'a, ()>,
    /// Pre-image, header included.
    old: Vec<u8>,
    committed: bool,
}

impl ItemEdit<'_> {
    /// Mutate the payload in place.
    pub fn update(&mut self, f: impl FnOnce(&mut [u8])) {
        let item = self.item;
        let mut page = item.frame.write();
        f(&mut page.as_mut_slice()[item.start + ITEM_HEADER_SIZE..item.start + item.len]);
    }

    /// Log the pre- and post-image under `tid` and end the edit.
    ///
    /// If logging fails the pre-image is restored.
    pub fn commit(mut self, tid: Tid) -> Result<()> {
        let record = LogRecord::Update {
            tid,
            item_id: self.item.id,
            old: std::mem::take(&mut self.old),
            new: self.item.raw(),
        };
        match self.item.wal.log(&record.encode()) {
            Ok(()) => {
                self.committed = true;
                Ok(())
            }
            Err(e) => {
                if let LogRecord::Update { old, .. } = record {
                    self.old = old;
                }
                Err(e)
            }
        }
    }
}

impl Drop for ItemEdit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.item.write_raw(&self.old);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::Page;
    use tempfile::tempdir;

    fn item_fixture(payload: &[u8]) -> (DataItem, Arc<Wal>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let wal = Arc::new(Wal::create(dir.path().join("test.log")).unwrap());

        let mut page = Page::new_data_page();
        let offset = page.insert_data(&wrap_raw(payload));
        let page_no = PageNo::new(2);
        let frame = Arc::new(PageFrame::new(page_no, page));

        let id = ItemId::new(page_no, offset);
        let item = DataItem::load(id, frame, Arc::clone(&wal)).unwrap();
        (item, wal, dir)
    }

    #[test]
    fn test_wrap_raw_layout() {
        assert_eq!(wrap_raw(b"hi"), vec![0, 2, 0, b'h', b'i']);
        let mut raw = wrap_raw(b"");
        set_raw_invalid(&mut raw);
        assert_eq!(raw, vec![1, 0, 0]);
    }

    #[test]
    fn test_load_reads_payload() {
        let (item, _wal, _dir) = item_fixture(b"payload");
        assert!(item.is_valid());
        assert_eq!(item.payload_len(), 7);
        assert_eq!(item.data(), b"payload");
        assert_eq!(item.id().offset(), 2);
    }

    #[test]
    fn test_load_rejects_bad_offsets() {
        let dir = tempdir().unwrap();
        let wal = Arc::new(Wal::create(dir.path().join("test.log")).unwrap());
        let mut page = Page::new_data_page();
        page.insert_data(&wrap_raw(b"abc"));
        let frame = Arc::new(PageFrame::new(PageNo::new(2), page));

        for offset in [0u16, 1, 6, 100] {
            let id = ItemId::new(PageNo::new(2), offset);
            let result = DataItem::load(id, Arc::clone(&frame), Arc::clone(&wal));
            assert!(matches!(result, Err(Error::InvalidItemId(_))), "offset {}", offset);
        }
    }

    #[test]
    fn test_edit_commit_logs_both_images() {
        let (item, wal, _dir) = item_fixture(b"aaaa");

        let mut edit = item.edit();
        edit.update(|data| data.copy_from_slice(b"bbbb"));
        edit.commit(5).unwrap();

        assert_eq!(item.data(), b"bbbb");
        let records = wal.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            LogRecord::decode(&records[0]).unwrap(),
            LogRecord::Update {
                tid: 5,
                item_id: item.id(),
                old: wrap_raw(b"aaaa"),
                new: wrap_raw(b"bbbb"),
            }
        );
    }

    #[test]
    fn test_edit_dropped_restores() {
        let (item, wal, _dir) = item_fixture(b"keep");

        {
            let mut edit = item.edit();
            edit.update(|data| data[0] = b'X');
        }

        assert_eq!(item.data(), b"keep");
        assert!(wal.is_empty());
    }

    #[test]
    fn test_edit_marks_page_dirty() {
        let (item, _wal, _dir) = item_fixture(b"x");
        assert!(!item.frame.is_dirty());
        let edit = item.edit();
        assert!(item.frame.is_dirty());
        drop(edit);
    }
}
