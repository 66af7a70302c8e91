//! Version Manager - multi-version concurrency control.
//!
//! Records are stored as [`VersionEntry`]s. Writers never overwrite a
//! record: inserts create a new entry stamped `min = tid`, deletes stamp
//! `max = tid` on an existing one under an exclusive record lock. Readers
//! decide per entry whether the version is visible to them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::buffer::{CacheStats, ObjectCache};
use crate::common::{ConflictKind, Error, ItemId, Result, Tid, SUPER_TID};
use crate::concurrency::visibility::{is_version_skip, is_visible};
use crate::concurrency::{IsolationLevel, LockManager, TidManager, Transaction, VersionEntry};
use crate::data::DataManager;

/// Payload bytes every version entry carries before the record.
const ENTRY_HEADER_SIZE: usize = 16;

type Context = Arc<Mutex<Transaction>>;

/// Transactional reads, inserts and deletes over the data manager.
///
/// # Thread Safety
/// - `active`: `Mutex` over the map of live contexts, held across
///   `begin` so snapshots are taken atomically with tid issue
/// - each context: its own `Mutex`, never held while blocked on a lock
/// - `entries`: reference-counted cache, one entry per record in use
///
/// Operations on one tid are expected from one thread at a time.
pub struct VersionManager {
    tm: Arc<TidManager>,
    dm: DataManager,
    lm: LockManager,
    /// Cached entries; `None` marks a record rolled back by recovery.
    entries: ObjectCache<ItemId, Option<VersionEntry>>,
    active: Mutex<HashMap<Tid, Context>>,
}

impl VersionManager {
    pub fn new(tm: Arc<TidManager>, dm: DataManager, entry_capacity: usize) -> Self {
        let mut active = HashMap::new();
        active.insert(SUPER_TID, Arc::new(Mutex::new(Transaction::super_transaction())));

        Self {
            tm,
            dm,
            lm: LockManager::new(),
            entries: ObjectCache::new(entry_capacity),
            active: Mutex::new(active),
        }
    }

    // ========================================================================
    // Public API: Transactions
    // ========================================================================

    /// Start a transaction. Repeatable read snapshots the active tids.
    pub fn begin(&self, level: IsolationLevel) -> Result<Tid> {
        let mut active = self.active.lock();
        let tid = self.tm.begin()?;
        let tx = Transaction::new(tid, level, active.keys().copied());
        active.insert(tid, Arc::new(Mutex::new(tx)));

        debug!(tid, %level, "transaction started");
        Ok(tid)
    }

    /// Commit `tid`, releasing its locks.
    ///
    /// # Errors
    /// Returns the sticky `Error::Conflict` if the transaction was rolled
    /// back automatically; it must then be aborted.
    pub fn commit(&self, tid: Tid) -> Result<()> {
        if tid == SUPER_TID {
            return Err(Error::InvalidTid(tid));
        }
        let ctx = self.context(tid)?;
        check_conflict(&ctx.lock())?;

        // Waiters handed a lock must already see the tid as committed.
        self.active.lock().remove(&tid);
        let committed = self.tm.commit(tid);
        self.lm.remove(tid);
        committed?;

        debug!(tid, "transaction committed");
        Ok(())
    }

    /// Roll back `tid`. After an automatic rollback this only discards the
    /// context.
    pub fn abort(&self, tid: Tid) -> Result<()> {
        if tid == SUPER_TID {
            return Err(Error::InvalidTid(tid));
        }
        self.internal_abort(tid, false)
    }

    fn internal_abort(&self, tid: Tid, auto: bool) -> Result<()> {
        let ctx = {
            let mut active = self.active.lock();
            if auto {
                active.get(&tid).cloned()
            } else {
                active.remove(&tid)
            }
        }
        .ok_or(Error::NoSuchTransaction(tid))?;

        {
            let mut tx = ctx.lock();
            if tx.auto_aborted {
                return Ok(());
            }
            tx.auto_aborted = auto;
        }

        self.lm.remove(tid);
        self.tm.abort(tid)?;
        debug!(tid, auto, "transaction aborted");
        Ok(())
    }

    // ========================================================================
    // Public API: Records
    // ========================================================================

    /// Read the record at `id` as `tid` sees it.
    pub fn read(&self, tid: Tid, id: ItemId) -> Result<Option<Vec<u8>>> {
        let ctx = self.context(tid)?;
        let tx = ctx.lock();
        check_conflict(&tx)?;

        let entry = self.obtain_entry(id)?;
        let result = match entry.as_ref() {
            Some(entry) => match is_visible(&self.tm, &tx, entry.min(), entry.max()) {
                Ok(true) => Ok(Some(entry.data())),
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        };
        self.release_entry(id)?;
        result
    }

    /// Insert a record created by `tid`.
    pub fn insert(&self, tid: Tid, data: &[u8]) -> Result<ItemId> {
        let ctx = self.context(tid)?;
        check_conflict(&ctx.lock())?;
        self.dm.insert(tid, &VersionEntry::wrap(tid, data))
    }

    /// Delete the record at `id` as `tid`.
    ///
    /// Returns false if the record isn't visible or was already deleted by
    /// `tid`. May block while another transaction holds the record.
    ///
    /// # Errors
    /// - `Error::InvalidTid` for the Super tid, which only inserts and reads
    /// - `Error::Conflict` if waiting would deadlock or the record was
    ///   deleted by a transaction `tid` cannot see. The transaction has been
    ///   rolled back and must be aborted.
    pub fn delete(&self, tid: Tid, id: ItemId) -> Result<bool> {
        if tid == SUPER_TID {
            return Err(Error::InvalidTid(tid));
        }
        let ctx = self.context(tid)?;
        check_conflict(&ctx.lock())?;

        let entry = self.obtain_entry(id)?;
        let result = match entry.as_ref() {
            Some(entry) => self.delete_entry(&ctx, tid, entry),
            None => Ok(false),
        };
        self.release_entry(id)?;
        result
    }

    fn delete_entry(&self, ctx: &Context, tid: Tid, entry: &VersionEntry) -> Result<bool> {
        if !is_visible(&self.tm, &ctx.lock(), entry.min(), entry.max())? {
            return Ok(false);
        }

        match self.lm.add(tid, entry.id()) {
            Ok(Some(wait)) => wait.wait(),
            Ok(None) => {}
            Err(Error::Deadlock { .. }) => {
                return Err(self.auto_abort(ctx, tid, ConflictKind::Deadlock));
            }
            Err(e) => return Err(e),
        }

        self.stamp_deleted(ctx, tid, entry)
    }

    fn stamp_deleted(&self, ctx: &Context, tid: Tid, entry: &VersionEntry) -> Result<bool> {
        let max = entry.max();
        if max == tid {
            return Ok(false);
        }
        if is_version_skip(&self.tm, &ctx.lock(), max)? {
            return Err(self.auto_abort(ctx, tid, ConflictKind::VersionSkip));
        }

        entry.set_max(tid)?;
        debug!(tid, item = %entry.id(), "record deleted");
        Ok(true)
    }

    /// Roll `tid` back on its own and return the sticky error.
    fn auto_abort(&self, ctx: &Context, tid: Tid, kind: ConflictKind) -> Error {
        warn!(tid, %kind, "rolling transaction back");
        ctx.lock().err = Some(kind);
        if let Err(e) = self.internal_abort(tid, true) {
            return e;
        }
        Error::Conflict { tid, kind }
    }

    // ========================================================================
    // Public API: Close and stats
    // ========================================================================

    /// Release every cached entry and close the data manager.
    pub fn close(&self) -> Result<()> {
        let entries = self.entries.drain(|id, entry| match entry {
            Some(_) => self.dm.release(id),
            None => Ok(()),
        });
        let closed = self.dm.close();
        entries.and(closed)
    }

    /// True if `tid` has an open context.
    pub fn is_active(&self, tid: Tid) -> bool {
        tid != SUPER_TID && self.active.lock().contains_key(&tid)
    }

    /// Number of open transactions, Super excluded.
    pub fn active_count(&self) -> usize {
        self.active.lock().len() - 1
    }

    pub fn entry_stats(&self) -> &CacheStats {
        self.entries.stats()
    }

    pub fn data_manager(&self) -> &DataManager {
        &self.dm
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lm
    }

    // ========================================================================
    // Entry cache
    // ========================================================================

    fn context(&self, tid: Tid) -> Result<Context> {
        self.active
            .lock()
            .get(&tid)
            .cloned()
            .ok_or(Error::NoSuchTransaction(tid))
    }

    fn obtain_entry(&self, id: ItemId) -> Result<Arc<Option<VersionEntry>>> {
        self.entries.obtain(id, |id| self.load_entry(id))
    }

    fn release_entry(&self, id: ItemId) -> Result<()> {
        self.entries.release(id, |id, entry| match entry {
            Some(_) => self.dm.release(id),
            None => Ok(()),
        })
    }

    fn load_entry(&self, id: ItemId) -> Result<Option<VersionEntry>> {
        let Some(item) = self.dm.read(id)? else {
            return Ok(None);
        };
        if item.payload_len() < ENTRY_HEADER_SIZE {
            self.dm.release(id)?;
            return Err(Error::InvalidItemId(id));
        }
        Ok(Some(VersionEntry::new(item)))
    }
}

fn check_conflict(tx: &Transaction) -> Result<()> {
    match tx.conflict() {
        Some(kind) => Err(Error::Conflict {
            tid: tx.tid(),
            kind,
        }),
        None => Ok(()),
    }
}
