//! Data-manager log records.
//!
//! # Record Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       1     type (INSERT = 0, UPDATE = 1)
//! 1       8     tid, little-endian
//! 9       8     item id, little-endian
//! 17      ...   insert: the wrapped item
//!               update: old image followed by new image, equal halves
//! ```

use crate::common::{Error, ItemId, Result, Tid};

const TYPE_INSERT: u8 = 0;
const TYPE_UPDATE: u8 = 1;

const HEADER_SIZE: usize = 1 + 8 + 8;

/// One redo/undo record written by the data manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A wrapped item was placed at `item_id`.
    Insert { tid: Tid, item_id: ItemId, raw: Vec<u8> },
    /// The wrapped item at `item_id` changed from `old` to `new`.
    Update {
        tid: Tid,
        item_id: ItemId,
        old: Vec<u8>,
        new: Vec<u8>,
    },
}

impl LogRecord {
    pub fn tid(&self) -> Tid {
        match self {
            LogRecord::Insert { tid, .. } | LogRecord::Update { tid, .. } => *tid,
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            LogRecord::Insert { item_id, .. } | LogRecord::Update { item_id, .. } => *item_id,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let (kind, tid, item_id, body_len) = match self {
            LogRecord::Insert { tid, item_id, raw } => (TYPE_INSERT, *tid, *item_id, raw.len()),
            LogRecord::Update {
                tid,
                item_id,
                old,
                new,
            } => (TYPE_UPDATE, *tid, *item_id, old.len() + new.len()),
        };

        let mut buf = Vec::with_capacity(HEADER_SIZE + body_len);
        buf.push(kind);
        buf.extend_from_slice(&tid.to_le_bytes());
        buf.extend_from_slice(&item_id.0.to_le_bytes());
        match self {
            LogRecord::Insert { raw, .. } => buf.extend_from_slice(raw),
            LogRecord::Update { old, new, .. } => {
                buf.extend_from_slice(old);
                buf.extend_from_slice(new);
            }
        }
        buf
    }

    /// Parse a record payload read back from the log.
    ///
    /// # Errors
    /// Returns `Error::CorruptLog` for an unknown type, a short header or an
    /// update whose images differ in length.
    pub fn decode(buf: &[u8]) -> Result<LogRecord> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::CorruptLog(format!(
                "log record of {} bytes is shorter than its header",
                buf.len()
            )));
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&buf[1..9]);
        let tid = Tid::from_le_bytes(word);
        word.copy_from_slice(&buf[9..17]);
        let item_id = ItemId(u64::from_le_bytes(word));
        let body = &buf[HEADER_SIZE..];

        match buf[0] {
            TYPE_INSERT => Ok(LogRecord::Insert {
                tid,
                item_id,
                raw: body.to_vec(),
            }),
            TYPE_UPDATE => {
                if body.len() % 2 != 0 {
                    return Err(Error::CorruptLog(format!(
                        "update record for {} has uneven images",
                        item_id
                    )));
                }
                let (old, new) = body.split_at(body.len() / 2);
                Ok(LogRecord::Update {
                    tid,
                    item_id,
                    old: old.to_vec(),
                    new: new.to_vec(),
                })
            }
            other => Err(Error::CorruptLog(format!("unknown log record type {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PageNo;

    #[test]
    fn test_insert_layout() {
        let record = LogRecord::Insert {
            tid: 3,
            item_id: ItemId::new(PageNo::new(2), 10),
            raw: vec![0, 2, 0, b'h', b'i'],
        };
        let buf = record.encode();

        assert_eq!(buf[0], TYPE_INSERT);
        assert_eq!(&buf[1..9], &3u64.to_le_bytes());
        assert_eq!(&buf[9..17], &((2u64 << 16) | 10).to_le_bytes());
        assert_eq!(&buf[17..], &[0, 2, 0, b'h', b'i']);
        assert_eq!(LogRecord::decode(&buf).unwrap(), record);
    }

    #[test]
    fn test_update_splits_halves() {
        let record = LogRecord::Update {
            tid: 9,
            item_id: ItemId::new(PageNo::new(5), 2),
            old: b"aaaa".to_vec(),
            new: b"bbbb".to_vec(),
        };
        let buf = record.encode();
        assert_eq!(buf[0], TYPE_UPDATE);
        assert_eq!(&buf[17..], b"aaaabbbb");

        let decoded = LogRecord::decode(&buf).unwrap();
        assert_eq!(decoded.tid(), 9);
        assert_eq!(decoded.item_id().page_no(), PageNo::new(5));
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(LogRecord::decode(&[0; 5]), Err(Error::CorruptLog(_))));

        let mut buf = vec![7u8];
        buf.extend_from_slice(&[0; 16]);
        assert!(matches!(LogRecord::decode(&buf), Err(Error::CorruptLog(_))));

        let mut buf = vec![TYPE_UPDATE];
        buf.extend_from_slice(&[0; 16]);
        buf.extend_from_slice(b"abc");
        assert!(matches!(LogRecord::decode(&buf), Err(Error::CorruptLog(_))));
    }
}
