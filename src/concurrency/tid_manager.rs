//! Tid Manager - durable transaction ids and their states.
//!
//! # File Layout
//! ```text
//! Offset      Size  Field
//! ------      ----  -----
//! 0           8     next tid to issue, little-endian
//! 8 + (T-1)   1     state of tid T (ACTIVE = 0, COMMITTED = 1, ABORTED = 2)
//! ```
//!
//! Tid 0 is the Super tid. It has no state byte: it is always committed and
//! never active or aborted.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::common::{Error, Result, Tid, SUPER_TID};

const HEADER_SIZE: u64 = 8;

const ACTIVE: u8 = 0;
const COMMITTED: u8 = 1;
const ABORTED: u8 = 2;

struct TidFile {
    file: File,
    /// Next tid `begin` will issue.
    next: Tid,
}

/// Issues tids and persists their states.
///
/// # Thread Safety
/// One `Mutex` over the file serializes every read and write.
///
/// # Durability
/// `begin` persists the counter, then the new tid's state byte, each with its
/// own fsync. `commit` and `abort` fsync the state byte.
pub struct TidManager {
    inner: Mutex<TidFile>,
}

impl TidManager {
    /// Create a new tid file. The first tid issued is 1.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&1u64.to_le_bytes())?;
        file.sync_all()?;

        Ok(Self {
            inner: Mutex::new(TidFile { file, next: 1 }),
        })
    }

    /// Open an existing tid file.
    ///
    /// A last tid whose state byte never reached the file is marked aborted.
    ///
    /// # Errors
    /// Returns `Error::CorruptTidFile` for any other disagreement between the
    /// file length and the counter.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len();
        if len < HEADER_SIZE {
            return Err(Error::CorruptTidFile(format!(
                "file is {} bytes, header needs {}",
                len, HEADER_SIZE
            )));
        }

        let mut buf = [0u8; 8];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)?;
        let next = u64::from_le_bytes(buf);

        if next == SUPER_TID {
            return Err(Error::CorruptTidFile("counter is 0".into()));
        }
        if next >= 2 && len == state_offset(next - 1) {
            // `begin` persisted the counter but crashed before the state byte.
            Self::write_state(&mut file, next - 1, ABORTED)?;
            warn!(tid = next - 1, "tid issued without a state byte, marked aborted");
        } else if len != state_offset(next) {
            return Err(Error::CorruptTidFile(format!(
                "counter {} does not match file length {}",
                next, len
            )));
        }

        info!(issued = next - 1, "tid file opened");
        Ok(Self {
            inner: Mutex::new(TidFile { file, next }),
        })
    }

    /// Issue a new tid and mark it active.
    pub fn begin(&self) -> Result<Tid> {
        let mut inner = self.inner.lock();
        let tid = inner.next;

        inner.file.seek(SeekFrom::Start(0))?;
        inner.file.write_all(&(tid + 1).to_le_bytes())?;
        inner.file.sync_all()?;
        inner.next = tid + 1;

        Self::write_state(&mut inner.file, tid, ACTIVE)?;
        debug!(tid, "tid issued");
        Ok(tid)
    }

    /// Mark `tid` committed.
    pub fn commit(&self, tid: Tid) -> Result<()> {
        self.set_state(tid, COMMITTED)
    }

    /// Mark `tid` aborted.
    pub fn abort(&self, tid: Tid) -> Result<()> {
        self.set_state(tid, ABORTED)
    }

    pub fn is_active(&self, tid: Tid) -> Result<bool> {
        if tid == SUPER_TID {
            return Ok(false);
        }
        Ok(self.state(tid)? == ACTIVE)
    }

    pub fn is_committed(&self, tid: Tid) -> Result<bool> {
        if tid == SUPER_TID {
            return Ok(true);
        }
        Ok(self.state(tid)? == COMMITTED)
    }

    pub fn is_aborted(&self, tid: Tid) -> Result<bool> {
        if tid == SUPER_TID {
            return Ok(false);
        }
        Ok(self.state(tid)? == ABORTED)
    }

    /// Number of tids issued so far.
    pub fn issued(&self) -> u64 {
        self.inner.lock().next - 1
    }

    pub fn close(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    fn set_state(&self, tid: Tid, state: u8) -> Result<()> {
        let mut inner = self.inner.lock();
        if tid == SUPER_TID || tid >= inner.next {
            return Err(Error::InvalidTid(tid));
        }
        Self::write_state(&mut inner.file, tid, state)
    }

    fn state(&self, tid: Tid) -> Result<u8> {
        let mut inner = self.inner.lock();
        if tid >= inner.next {
            return Err(Error::InvalidTid(tid));
        }

        let mut buf = [0u8; 1];
        inner.file.seek(SeekFrom::Start(state_offset(tid)))?;
        inner.file.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn write_state(file: &mut File, tid: Tid, state: u8) -> Result<()> {
        file.seek(SeekFrom::Start(state_offset(tid)))?;
        file.write_all(&[state])?;
        file.sync_all()?;
        Ok(())
    }
}

#[inline]
fn state_offset(tid: Tid) -> u64 {
    HEADER_SIZE + (tid - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_begin_issues_sequential_tids() {
        let dir = tempdir().unwrap();
        let tm = TidManager::create(dir.path().join("test.tid")).unwrap();

        assert_eq!(tm.begin().unwrap(), 1);
        assert_eq!(tm.begin().unwrap(), 2);
        assert_eq!(tm.begin().unwrap(), 3);
        assert_eq!(tm.issued(), 3);
        assert!(tm.is_active(2).unwrap());
    }

    #[test]
    fn test_state_transitions() {
        let dir = tempdir().unwrap();
        let tm = TidManager::create(dir.path().join("test.tid")).unwrap();
        let a = tm.begin().unwrap();
        let b = tm.begin().unwrap();

        tm.commit(a).unwrap();
        tm.abort(b).unwrap();

        assert!(tm.is_committed(a).unwrap());
        assert!(!tm.is_active(a).unwrap());
        assert!(tm.is_aborted(b).unwrap());
        assert!(!tm.is_committed(b).unwrap());
    }

    #[test]
    fn test_super_tid_is_hardwired() {
        let dir = tempdir().unwrap();
        let tm = TidManager::create(dir.path().join("test.tid")).unwrap();

        assert!(tm.is_committed(SUPER_TID).unwrap());
        assert!(!tm.is_active(SUPER_TID).unwrap());
        assert!(!tm.is_aborted(SUPER_TID).unwrap());
        assert!(matches!(tm.commit(SUPER_TID), Err(Error::InvalidTid(0))));
        assert!(matches!(tm.abort(SUPER_TID), Err(Error::InvalidTid(0))));
    }

    #[test]
    fn test_unissued_tid_rejected() {
        let dir = tempdir().unwrap();
        let tm = TidManager::create(dir.path().join("test.tid")).unwrap();
        tm.begin().unwrap();

        assert!(matches!(tm.commit(2), Err(Error::InvalidTid(2))));
        assert!(matches!(tm.is_active(9), Err(Error::InvalidTid(9))));
    }

    #[test]
    fn test_states_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.tid");
        {
            let tm = TidManager::create(&path).unwrap();
            let a = tm.begin().unwrap();
            let b = tm.begin().unwrap();
            tm.begin().unwrap();
            tm.commit(a).unwrap();
            tm.abort(b).unwrap();
        }

        assert_eq!(fs::metadata(&path).unwrap().len(), 8 + 3);

        let tm = TidManager::open(&path).unwrap();
        assert!(tm.is_committed(1).unwrap());
        assert!(tm.is_aborted(2).unwrap());
        assert!(tm.is_active(3).unwrap());
        assert_eq!(tm.begin().unwrap(), 4);
    }

    #[test]
    fn test_torn_begin_is_aborted_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.tid");
        {
            let tm = TidManager::create(&path).unwrap();
            let tid = tm.begin().unwrap();
            tm.commit(tid).unwrap();
        }

        // Counter names tid 2 as issued, but its state byte was never written.
        let mut raw = fs::read(&path).unwrap();
        raw[..8].copy_from_slice(&3u64.to_le_bytes());
        fs::write(&path, &raw).unwrap();

        let tm = TidManager::open(&path).unwrap();
        assert!(tm.is_committed(1).unwrap());
        assert!(tm.is_aborted(2).unwrap());
        assert_eq!(tm.begin().unwrap(), 3);
        drop(tm);

        assert_eq!(fs::metadata(&path).unwrap().len(), 8 + 3);
        assert!(TidManager::open(&path).is_ok());
    }

    #[test]
    fn test_length_mismatch_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.tid");
        {
            let tm = TidManager::create(&path).unwrap();
            tm.begin().unwrap();
        }

        // Counter says four tids were issued but only one state byte exists.
        let mut raw = fs::read(&path).unwrap();
        raw[..8].copy_from_slice(&5u64.to_le_bytes());
        fs::write(&path, &raw).unwrap();
        assert!(matches!(TidManager::open(&path), Err(Error::CorruptTidFile(_))));

        raw[..8].copy_from_slice(&0u64.to_le_bytes());
        fs::write(&path, &raw).unwrap();
        assert!(matches!(TidManager::open(&path), Err(Error::CorruptTidFile(_))));
    }

    #[test]
    fn test_short_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.tid");
        fs::write(&path, [1, 0, 0]).unwrap();
        assert!(matches!(TidManager::open(&path), Err(Error::CorruptTidFile(_))));
    }
}
