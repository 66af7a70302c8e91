//! Boot file - the store's metadata pointer blob.
//!
//! Layers above the engine keep their root pointers here. The blob is opaque
//! to the engine; it is replaced atomically by writing a temp file, syncing
//! it and renaming it over the live file.
//!
//! # File Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     CRC32 of the blob, little-endian
//! 4       ...   blob
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::common::{Error, Result};

const CRC_SIZE: usize = 4;

/// Reads and atomically replaces the boot file.
pub struct BootFile {
    path: PathBuf,
    tmp_path: PathBuf,
    /// Serializes concurrent updates.
    lock: Mutex<()>,
}

impl BootFile {
    /// Create the boot file holding `initial`.
    ///
    /// # Errors
    /// Returns an error if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P, initial: &[u8]) -> Result<Self> {
        let boot = Self::at(path.as_ref());
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&boot.path)?;
        file.write_all(&encode(initial))?;
        file.sync_all()?;
        Ok(boot)
    }

    /// Open an existing boot file, removing any temp file a crash left behind.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let boot = Self::at(path.as_ref());
        if boot.tmp_path.exists() {
            warn!(path = %boot.tmp_path.display(), "removing stale boot temp file");
            fs::remove_file(&boot.tmp_path)?;
        }
        if !boot.path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("boot file {} not found", boot.path.display()),
            )
            .into());
        }
        Ok(boot)
    }

    /// Read the current blob.
    ///
    /// # Errors
    /// Returns `Error::CorruptBootFile` if the CRC doesn't match.
    pub fn load(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        File::open(&self.path)?.read_to_end(&mut buf)?;

        if buf.len() < CRC_SIZE {
            return Err(Error::CorruptBootFile);
        }
        let (crc, blob) = buf.split_at(CRC_SIZE);
        let stored = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        if stored != crc32fast::hash(blob) {
            return Err(Error::CorruptBootFile);
        }
        Ok(blob.to_vec())
    }

    /// Replace the blob: write temp, fsync, rename.
    pub fn update(&self, blob: &[u8]) -> Result<()> {
        let _guard = self.lock.lock();

        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.tmp_path)?;
        tmp.write_all(&encode(blob))?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&self.tmp_path, &self.path)?;
        if let Some(parent) = self.path.parent() {
            // Persist the rename itself.
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        debug!(len = blob.len(), "boot file replaced");
        Ok(())
    }

    fn at(path: &Path) -> Self {
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        Self {
            path: path.to_path_buf(),
            tmp_path: PathBuf::from(tmp),
            lock: Mutex::new(()),
        }
    }
}

fn encode(blob: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CRC_SIZE + blob.len());
    buf.extend_from_slice(&crc32fast::hash(blob).to_le_bytes());
    buf.extend_from_slice(blob);
    buf
}
