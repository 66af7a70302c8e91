//! Object cache statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by an [`ObjectCache`](super::ObjectCache).
///
/// All fields are atomic so every cache user can bump counters without
/// taking the cache lock. `Ordering::Relaxed` is enough: counters are
/// independent and only need atomicity.
///
/// # Example
/// ```
/// use versadb::buffer::CacheStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = CacheStats::new();
/// stats.hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Debug)]
pub struct CacheStats {
    /// Obtains served from an already cached object.
    pub hits: AtomicU64,

    /// Obtains that ran the loader.
    pub misses: AtomicU64,

    /// Objects dropped after their last release (or on drain).
    pub evictions: AtomicU64,

    /// Loader calls that returned an error.
    pub load_failures: AtomicU64,
}

impl CacheStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
        }
    }

    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Get a non-atomic copy of the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.load_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub load_failures: u64,
}

impl StatsSnapshot {
    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, hit_rate: {:.2}% }}",
            self.hits,
            self.misses,
            self.evictions,
            self.hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits.load(Ordering::Relaxed), 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = CacheStats::new();
        stats.hits.fetch_add(7, Ordering::Relaxed);
        stats.misses.fetch_add(3, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 7);
        assert_eq!(snapshot.misses, 3);
        assert_eq!(snapshot.hit_rate(), 0.7);
    }

    #[test]
    fn test_stats_reset() {
        let stats = CacheStats::new();
        stats.evictions.fetch_add(100, Ordering::Relaxed);

        stats.reset();

        assert_eq!(stats.evictions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_stats_display() {
        let stats = CacheStats::new();
        stats.hits.fetch_add(80, Ordering::Relaxed);
        stats.misses.fetch_add(20, Ordering::Relaxed);
        stats.evictions.fetch_add(5, Ordering::Relaxed);

        let display = format!("{}", stats.snapshot());

        assert!(display.contains("hits: 80"));
        assert!(display.contains("misses: 20"));
        assert!(display.contains("80.00%"));
    }
}
