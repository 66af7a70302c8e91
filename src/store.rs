//! Store - the engine's entry point.
//!
//! A store is a directory holding four files:
//!
//! | file         | contents                              |
//! |--------------|---------------------------------------|
//! | `store.db`   | pages                                 |
//! | `store.log`  | write-ahead log                       |
//! | `store.tid`  | transaction counter and states        |
//! | `store.boot` | metadata blob for layers above        |

use std::fs;
use std::sync::Arc;

use tracing::info;

use crate::common::{Config, ItemId, Result, Tid};
use crate::concurrency::{IsolationLevel, TidManager, VersionManager};
use crate::data::DataManager;
use crate::storage::BootFile;

pub const DB_FILE: &str = "store.db";
pub const LOG_FILE: &str = "store.log";
pub const TID_FILE: &str = "store.tid";
pub const BOOT_FILE: &str = "store.boot";

/// An open store.
///
/// # Example
/// ```no_run
/// use versadb::{Config, IsolationLevel, Store};
///
/// let store = Store::create(Config {
///     path: "my_store".into(),
///     ..Default::default()
/// })?;
///
/// let tid = store.begin(IsolationLevel::ReadCommitted)?;
/// let id = store.insert(tid, b"hello")?;
/// store.commit(tid)?;
///
/// let reader = store.begin(IsolationLevel::RepeatableRead)?;
/// assert_eq!(store.read(reader, id)?, Some(b"hello".to_vec()));
/// store.commit(reader)?;
///
/// store.close()?;
/// # Ok::<(), versadb::Error>(())
/// ```
pub struct Store {
    config: Config,
    tm: Arc<TidManager>,
    vm: VersionManager,
    boot: BootFile,
}

impl Store {
    /// Create a new store under `config.path`. The directory is created if
    /// missing; the store files must not exist yet.
    pub fn create(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.path)?;

        let tm = Arc::new(TidManager::create(config.path.join(TID_FILE))?);
        let dm = DataManager::create(
            &config.path.join(DB_FILE),
            &config.path.join(LOG_FILE),
            &config,
        )?;
        let boot = BootFile::create(config.path.join(BOOT_FILE), &[])?;

        info!(path = %config.path.display(), "store created");
        Ok(Self::assemble(config, tm, dm, boot))
    }

    /// Open an existing store, recovering it if it was not closed cleanly.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let tm = Arc::new(TidManager::open(config.path.join(TID_FILE))?);
        let dm = DataManager::open(
            &config.path.join(DB_FILE),
            &config.path.join(LOG_FILE),
            &config,
            &tm,
        )?;
        let boot = BootFile::open(config.path.join(BOOT_FILE))?;

        info!(path = %config.path.display(), "store opened");
        Ok(Self::assemble(config, tm, dm, boot))
    }

    fn assemble(config: Config, tm: Arc<TidManager>, dm: DataManager, boot: BootFile) -> Self {
        let vm = VersionManager::new(Arc::clone(&tm), dm, config.entry_cache_capacity);
        Self { config, tm, vm, boot }
    }

    pub fn begin(&self, level: IsolationLevel) -> Result<Tid> {
        self.vm.begin(level)
    }

    pub fn read(&self, tid: Tid, id: ItemId) -> Result<Option<Vec<u8>>> {
        self.vm.read(tid, id)
    }

    pub fn insert(&self, tid: Tid, data: &[u8]) -> Result<ItemId> {
        self.vm.insert(tid, data)
    }

    pub fn delete(&self, tid: Tid, id: ItemId) -> Result<bool> {
        self.vm.delete(tid, id)
    }

    pub fn commit(&self, tid: Tid) -> Result<()> {
        self.vm.commit(tid)
    }

    pub fn abort(&self, tid: Tid) -> Result<()> {
        self.vm.abort(tid)
    }

    /// Current boot blob.
    pub fn boot(&self) -> Result<Vec<u8>> {
        self.boot.load()
    }

    /// Atomically replace the boot blob.
    pub fn update_boot(&self, blob: &[u8]) -> Result<()> {
        self.boot.update(blob)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn version_manager(&self) -> &VersionManager {
        &self.vm
    }

    /// Flush everything and mark the store cleanly closed.
    pub fn close(self) -> Result<()> {
        self.vm.close()?;
        self.tm.close()?;
        info!(path = %self.config.path.display(), "store closed");
        Ok(())
    }
}
