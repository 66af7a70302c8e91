//! Version entries - data items stamped with their creator and deleter.
//!
//! # Entry Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     min: tid that created the entry, little-endian
//! 8       8     max: tid that deleted it, 0 while live
//! 16      ...   record payload
//! ```

use std::sync::Arc;

use crate::common::{ItemId, Result, Tid};
use crate::data::DataItem;

const MIN_OFFSET: usize = 0;
const MAX_OFFSET: usize = 8;
const DATA_OFFSET: usize = 16;

/// A version entry over a cached data item.
pub struct VersionEntry {
    item: Arc<DataItem>,
}

impl VersionEntry {
    /// Build the item payload of a new entry created by `tid`.
    pub fn wrap(tid: Tid, data: &[u8]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(DATA_OFFSET + data.len());
        raw.extend_from_slice(&tid.to_le_bytes());
        raw.extend_from_slice(&0u64.to_le_bytes());
        raw.extend_from_slice(data);
        raw
    }

    pub(crate) fn new(item: Arc<DataItem>) -> Self {
        Self { item }
    }

    pub fn id(&self) -> ItemId {
        self.item.id()
    }

    /// Creator tid.
    pub fn min(&self) -> Tid {
        self.item.with_data(|d| read_tid(d, MIN_OFFSET))
    }

    /// Deleter tid, 0 if the entry is live.
    pub fn max(&self) -> Tid {
        self.item.with_data(|d| read_tid(d, MAX_OFFSET))
    }

    /// Copy of the record payload.
    pub fn data(&self) -> Vec<u8> {
        self.item.with_data(|d| d[DATA_OFFSET..].to_vec())
    }

    /// Stamp the entry deleted by `tid`, logging the change under `tid`.
    pub fn set_max(&self, tid: Tid) -> Result<()> {
        let mut edit = self.item.edit();
        edit.update(|d| d[MAX_OFFSET..DATA_OFFSET].copy_from_slice(&tid.to_le_bytes()));
        edit.commit(tid)
    }
}

fn read_tid(data: &[u8], offset: usize) -> Tid {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    Tid::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_layout() {
        let raw = VersionEntry::wrap(7, b"row");
        assert_eq!(raw.len(), 19);
        assert_eq!(&raw[0..8], &7u64.to_le_bytes());
        assert_eq!(&raw[8..16], &[0; 8]);
        assert_eq!(&raw[16..], b"row");
        assert_eq!(read_tid(&raw, MIN_OFFSET), 7);
        assert_eq!(read_tid(&raw, MAX_OFFSET), 0);
    }
}
