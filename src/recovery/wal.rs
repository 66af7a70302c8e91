//! Write-ahead log file.
//!
//! # File Layout
//! ```text
//! ┌──────────────┬──────────┬──────────┬─────┬────────────┐
//! │ checksum (4) │ record 1 │ record 2 │ ... │ (bad tail) │
//! └──────────────┴──────────┴──────────┴─────┴────────────┘
//!
//! record = [size:4][checksum:4][payload:size]
//! ```
//!
//! All integers are little-endian. A record's checksum covers its payload;
//! the file checksum in the header folds over every whole record and is
//! rewritten (then fsynced) on every append, so the header is the commit
//! point of the log.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::common::{Error, Result};

/// Multiplier of the rolling checksum.
pub const CHECKSUM_SEED: u32 = 12321;

const HEADER_SIZE: usize = 4;
const RECORD_HEADER_SIZE: usize = 8;

/// Fold `bytes` into a running checksum: `acc = acc * seed + byte`.
pub fn checksum(acc: u32, bytes: &[u8]) -> u32 {
    bytes.iter().fold(acc, |acc, &b| {
        acc.wrapping_mul(CHECKSUM_SEED).wrapping_add(b as u32)
    })
}

struct WalFile {
    file: File,
    /// Running checksum of every record, mirrors the header.
    checksum: u32,
    /// Length of the valid log, header included.
    len: u64,
}

/// Append-only, checksummed log.
///
/// # Thread Safety
/// One `Mutex` serializes appends; `log` returns only after the fsync.
pub struct Wal {
    inner: Mutex<WalFile>,
}

impl Wal {
    /// Create a new, empty log file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&0u32.to_le_bytes())?;
        file.sync_all()?;

        Ok(Self {
            inner: Mutex::new(WalFile {
                file,
                checksum: 0,
                len: HEADER_SIZE as u64,
            }),
        })
    }

    /// Open a log file, verifying its checksum and cutting any bad tail.
    ///
    /// # Errors
    /// Returns `Error::CorruptLog` if the header matches no record boundary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let buf = fs::read(path)?;
        if buf.len() < HEADER_SIZE {
            return Err(Error::CorruptLog("missing header".into()));
        }
        let header = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);

        // Every record boundary and the checksum of the records before it.
        let mut boundaries = vec![(HEADER_SIZE, 0u32)];
        let mut pos = HEADER_SIZE;
        let mut running = 0u32;
        while let Some(end) = next_record(&buf, pos) {
            running = checksum(running, &buf[pos..end]);
            pos = end;
            boundaries.push((pos, running));
        }

        let (keep, sum) = if pos < buf.len() {
            warn!(
                path = %path.display(),
                valid = pos,
                len = buf.len(),
                "truncating bad log tail"
            );
            (pos, running)
        } else if header == running {
            (pos, running)
        } else if let Some(&(end, sum)) = boundaries.iter().rev().find(|(_, c)| *c == header) {
            warn!(
                path = %path.display(),
                acknowledged = end,
                len = buf.len(),
                "dropping unacknowledged log records"
            );
            (end, sum)
        } else {
            return Err(Error::CorruptLog(format!(
                "header checksum {:#x} matches no record boundary",
                header
            )));
        };

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        if keep < buf.len() || header != sum {
            file.set_len(keep as u64)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&sum.to_le_bytes())?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), records = boundaries.len() - 1, "log opened");

        Ok(Self {
            inner: Mutex::new(WalFile {
                file,
                checksum: sum,
                len: keep as u64,
            }),
        })
    }

    /// Append a record and fsync. Returns once the record is durable.
    pub fn log(&self, payload: &[u8]) -> Result<()> {
        let record = wrap(payload);
        let mut wal = self.inner.lock();

        let offset = wal.len;
        wal.file.seek(SeekFrom::Start(offset))?;
        wal.file.write_all(&record)?;

        let sum = checksum(wal.checksum, &record);
        wal.file.seek(SeekFrom::Start(0))?;
        wal.file.write_all(&sum.to_le_bytes())?;
        wal.file.sync_all()?;

        wal.checksum = sum;
        wal.len += record.len() as u64;
        Ok(())
    }

    /// Every record payload in log order.
    pub fn records(&self) -> Result<Vec<Vec<u8>>> {
        let mut wal = self.inner.lock();
        let len = wal.len;

        let mut buf = vec![0u8; len as usize];
        wal.file.seek(SeekFrom::Start(0))?;
        wal.file.read_exact(&mut buf)?;

        let mut records = Vec::new();
        let mut pos = HEADER_SIZE;
        while let Some(end) = next_record(&buf, pos) {
            records.push(buf[pos + RECORD_HEADER_SIZE..end].to_vec());
            pos = end;
        }
        Ok(records)
    }

    /// Current file checksum.
    pub fn checksum(&self) -> u32 {
        self.inner.lock().checksum
    }

    /// Length of the log file in bytes.
    pub fn len(&self) -> u64 {
        self.inner.lock().len
    }

    /// True if the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == HEADER_SIZE as u64
    }

    pub fn close(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }
}

/// Frame a payload as `[size][checksum][payload]`.
fn wrap(payload: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
    record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    record.extend_from_slice(&checksum(0, payload).to_le_bytes());
    record.extend_from_slice(payload);
    record
}

/// End offset of the well-formed record starting at `pos`, if any.
fn next_record(buf: &[u8], pos: usize) -> Option<usize> {
    let header = buf.get(pos..pos + RECORD_HEADER_SIZE)?;
    let size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let sum = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let end = pos.checked_add(RECORD_HEADER_SIZE)?.checked_add(size)?;
    let payload = buf.get(pos + RECORD_HEADER_SIZE..end)?;
    if checksum(0, payload) != sum {
        return None;
    }
    Some(end)
}
