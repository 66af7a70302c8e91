//! Object Cache - reference-counted key → object cache.
//!
//! The [`ObjectCache`] is shared by three layers with unrelated key spaces:
//! pages, data items and version entries. Each layer supplies its own loader
//! on [`ObjectCache::obtain`] and its own evictor on [`ObjectCache::release`].

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::buffer::CacheStats;
use crate::common::{Error, Result};

/// How long `obtain` sleeps while another thread loads the same key.
const LOAD_WAIT: Duration = Duration::from_millis(1);

struct Slot<V> {
    value: Arc<V>,
    refs: usize,
}

struct CacheState<K, V> {
    /// Loaded objects and their reference counts.
    slots: HashMap<K, Slot<V>>,
    /// Keys whose loader is currently running.
    loading: HashSet<K>,
    /// Live objects, counting in-flight loads.
    count: usize,
}

/// A capacity-bounded, reference-counted object cache.
///
/// There is no replacement policy: an object stays cached while anyone holds
/// a reference to it and is evicted the moment the last reference is released.
/// When `capacity` objects are live, `obtain` fails with [`Error::CacheFull`].
///
/// # Thread Safety
/// One `Mutex` guards reference counts and in-flight markers. Loaders run
/// outside the lock; concurrent `obtain` calls for a key that is being loaded
/// sleep-wait until the load finishes, so a key is never loaded twice.
/// Evictors run under the lock, so a reload cannot observe a half-written
/// eviction.
///
/// # Example
/// ```
/// use versadb::buffer::ObjectCache;
///
/// let cache: ObjectCache<u32, String> = ObjectCache::new(0);
/// let value = cache.obtain(7, |key| Ok(format!("object {}", key))).unwrap();
/// assert_eq!(value.as_str(), "object 7");
/// cache.release(7, |_, _| Ok(())).unwrap();
/// assert_eq!(cache.len(), 0);
/// ```
pub struct ObjectCache<K, V> {
    state: Mutex<CacheState<K, V>>,
    /// Maximum live objects, 0 for unbounded.
    capacity: usize,
    stats: CacheStats,
}

impl<K, V> ObjectCache<K, V>
where
    K: Copy + Eq + Hash,
{
    /// Create a cache holding at most `capacity` live objects (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                slots: HashMap::new(),
                loading: HashSet::new(),
                count: 0,
            }),
            capacity,
            stats: CacheStats::new(),
        }
    }

    /// Get the object for `key`, loading it with `loader` on a miss.
    ///
    /// Every successful call must be paired with one [`release`](Self::release).
    ///
    /// # Errors
    /// - `Error::CacheFull` if `capacity` objects are live
    /// - Whatever `loader` returns; the in-flight marker is cleared first
    pub fn obtain<F>(&self, key: K, loader: F) -> Result<Arc<V>>
    where
        F: FnOnce(K) -> Result<V>,
    {
        loop {
            let mut state = self.state.lock();

            if let Some(slot) = state.slots.get_mut(&key) {
                slot.refs += 1;
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(&slot.value));
            }

            if state.loading.contains(&key) {
                drop(state);
                thread::sleep(LOAD_WAIT);
                continue;
            }

            if self.capacity > 0 && state.count >= self.capacity {
                return Err(Error::CacheFull);
            }

            state.count += 1;
            state.loading.insert(key);
            break;
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let loaded = loader(key);

        let mut state = self.state.lock();
        state.loading.remove(&key);

        match loaded {
            Ok(value) => {
                let value = Arc::new(value);
                state.slots.insert(
                    key,
                    Slot {
                        value: Arc::clone(&value),
                        refs: 1,
                    },
                );
                Ok(value)
            }
            Err(e) => {
                state.count -= 1;
                self.stats.load_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Drop one reference to `key`. At zero, `evictor` runs and the entry is
    /// removed. Releasing a key that is not cached is a no-op.
    pub fn release<F>(&self, key: K, evictor: F) -> Result<()>
    where
        F: FnOnce(K, &V) -> Result<()>,
    {
        let mut state = self.state.lock();

        let slot = match state.slots.entry(key) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.refs -= 1;
                if slot.refs > 0 {
                    return Ok(());
                }
                occupied.remove()
            }
            Entry::Vacant(_) => return Ok(()),
        };

        state.count -= 1;
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        evictor(key, &slot.value)
    }

    /// Evict every cached object regardless of reference count.
    ///
    /// Used when closing a layer. All evictors run; the first error is returned.
    pub fn drain<F>(&self, mut evictor: F) -> Result<()>
    where
        F: FnMut(K, &V) -> Result<()>,
    {
        let mut state = self.state.lock();
        let slots: Vec<(K, Slot<V>)> = state.slots.drain().collect();
        state.count -= slots.len();

        let mut first_err = None;
        for (key, slot) in slots {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = evictor(key, &slot.value) {
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Current reference count of `key`, or None if it is not cached.
    pub fn ref_count(&self, key: K) -> Option<usize> {
        self.state.lock().slots.get(&key).map(|slot| slot.refs)
    }

    /// Number of live objects, including in-flight loads.
    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum live objects (0 = unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
