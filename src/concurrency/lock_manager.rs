//! Lock Manager - exclusive record locks with deadlock detection.
//!
//! Each transaction holds a set of keys and waits for at most one. The
//! wait-for graph is `tid → awaited key → key's holder → ...`; any cycle in
//! it is a deadlock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::common::{Error, ItemId, Result, Tid};

/// Handoff signal for one waiting transaction.
struct Waiter {
    granted: Mutex<bool>,
    cv: Condvar,
}

impl Waiter {
    fn new() -> Self {
        Self {
            granted: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn grant(&self) {
        *self.granted.lock() = true;
        self.cv.notify_all();
    }
}

/// Returned by [`LockManager::add`] when the key is held by someone else.
///
/// The caller owns the key once [`wait`](Self::wait) returns.
pub struct LockWait {
    waiter: Arc<Waiter>,
}

impl LockWait {
    /// Block until the key is handed over.
    pub fn wait(self) {
        let mut granted = self.waiter.granted.lock();
        while !*granted {
            self.waiter.cv.wait(&mut granted);
        }
    }

    /// True if the key was already handed over.
    pub fn is_granted(&self) -> bool {
        *self.waiter.granted.lock()
    }
}

#[derive(Default)]
struct LockTable {
    /// Keys each transaction holds.
    held: HashMap<Tid, Vec<ItemId>>,
    /// Current holder of each locked key.
    holder: HashMap<ItemId, Tid>,
    /// Transactions queued on each key, oldest first.
    waiters: HashMap<ItemId, VecDeque<Tid>>,
    /// The one key each waiting transaction is blocked on.
    waiting_for: HashMap<Tid, ItemId>,
    /// Handoff signals of waiting transactions.
    wakeups: HashMap<Tid, Arc<Waiter>>,
    /// Traversal stamp each tid was last visited with.
    stamps: HashMap<Tid, u64>,
    /// Last stamp handed out. Only grows.
    stamp: u64,
}

impl LockTable {
    fn has_deadlock(&mut self) -> bool {
        let base = self.stamp;
        let roots: Vec<Tid> = self
            .held
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(tid, _)| *tid)
            .collect();

        for root in roots {
            if self.stamps.get(&root).is_some_and(|s| *s > base) {
                continue;
            }
            self.stamp += 1;
            if self.walk(root, base) {
                return true;
            }
        }
        false
    }

    /// Follow wait edges from `tid`. Revisiting a tid stamped in this walk
    /// is a cycle; reaching one stamped earlier in this check is not.
    fn walk(&mut self, mut tid: Tid, base: u64) -> bool {
        loop {
            match self.stamps.get(&tid) {
                Some(&s) if s == self.stamp => return true,
                Some(&s) if s > base => return false,
                _ => {}
            }
            self.stamps.insert(tid, self.stamp);

            let Some(key) = self.waiting_for.get(&tid) else {
                return false;
            };
            match self.holder.get(key) {
                Some(&next) => tid = next,
                None => return false,
            }
        }
    }

    fn dequeue(&mut self, key: ItemId, tid: Tid) {
        if let Some(queue) = self.waiters.get_mut(&key) {
            queue.retain(|t| *t != tid);
            if queue.is_empty() {
                self.waiters.remove(&key);
            }
        }
    }

    /// Hand `key` to the oldest queued transaction still waiting for it.
    fn grant_next(&mut self, key: ItemId) {
        let Some(mut queue) = self.waiters.remove(&key) else {
            return;
        };

        while let Some(next) = queue.pop_front() {
            if self.waiting_for.get(&next) != Some(&key) {
                continue;
            }
            self.waiting_for.remove(&next);
            self.holder.insert(key, next);
            self.held.entry(next).or_default().push(key);
            if let Some(waiter) = self.wakeups.remove(&next) {
                waiter.grant();
            }
            debug!(tid = next, item = %key, "lock handed over");
            break;
        }

        if !queue.is_empty() {
            self.waiters.insert(key, queue);
        }
    }
}

/// Tracks which transaction holds which record and who waits for whom.
///
/// # Thread Safety
/// One `Mutex` guards the whole table. Waiting happens outside it, on a
/// per-transaction `Condvar`.
///
/// # Example
/// ```
/// use versadb::concurrency::LockManager;
/// use versadb::{ItemId, PageNo};
///
/// let lm = LockManager::new();
/// let key = ItemId::new(PageNo::new(2), 2);
///
/// assert!(lm.add(1, key).unwrap().is_none());
/// let wait = lm.add(2, key).unwrap().expect("held by 1");
///
/// lm.remove(1);
/// wait.wait();
/// assert_eq!(lm.holder(key), Some(2));
/// ```
pub struct LockManager {
    table: Mutex<LockTable>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
        }
    }

    /// Acquire `key` for `tid`.
    ///
    /// Returns `None` if `tid` now holds the key, or a [`LockWait`] to block
    /// on until the current holder lets go.
    ///
    /// # Errors
    /// - `Error::Deadlock` if waiting would close a cycle; nothing is registered
    /// - `Error::AlreadyWaiting` if `tid` is already blocked on another key
    pub fn add(&self, tid: Tid, key: ItemId) -> Result<Option<LockWait>> {
        let mut guard = self.table.lock();
        let table = &mut *guard;

        match table.holder.get(&key) {
            Some(&holder) if holder == tid => return Ok(None),
            Some(_) => {}
            None => {
                table.holder.insert(key, tid);
                table.held.entry(tid).or_default().push(key);
                return Ok(None);
            }
        }

        if table.waiting_for.contains_key(&tid) {
            return Err(Error::AlreadyWaiting { tid });
        }

        table.waiting_for.insert(tid, key);
        table.waiters.entry(key).or_default().push_back(tid);

        if table.has_deadlock() {
            table.waiting_for.remove(&tid);
            table.dequeue(key, tid);
            warn!(tid, item = %key, "deadlock detected");
            return Err(Error::Deadlock { tid });
        }

        let waiter = Arc::new(Waiter::new());
        table.wakeups.insert(tid, Arc::clone(&waiter));
        debug!(tid, item = %key, "waiting for lock");
        Ok(Some(LockWait { waiter }))
    }

    /// Release every key `tid` holds and drop any wait it registered.
    pub fn remove(&self, tid: Tid) {
        let mut guard = self.table.lock();
        let table = &mut *guard;

        if let Some(key) = table.waiting_for.remove(&tid) {
            table.dequeue(key, tid);
        }
        table.wakeups.remove(&tid);
        table.stamps.remove(&tid);

        for key in table.held.remove(&tid).unwrap_or_default() {
            table.holder.remove(&key);
            table.grant_next(key);
        }
    }

    /// Transaction currently holding `key`.
    pub fn holder(&self, key: ItemId) -> Option<Tid> {
        self.table.lock().holder.get(&key).copied()
    }

    /// Key `tid` is blocked on, if any.
    pub fn waiting_for(&self, tid: Tid) -> Option<ItemId> {
        self.table.lock().waiting_for.get(&tid).copied()
    }

    /// Keys `tid` holds, in acquisition order.
    pub fn held_by(&self, tid: Tid) -> Vec<ItemId> {
        self.table
            .lock()
            .held
            .get(&tid)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
