//! Counters reported by the buffer pool.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, bumped with `Relaxed` ordering while the pool runs.
///
/// Read them through [`snapshot`](Self::snapshot); fields of one snapshot
/// may come from slightly different moments.
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    pub(crate) cache_hits: AtomicU64,
    pub(crate) cache_misses: AtomicU64,
    pub(crate) evictions: AtomicU64,
    pub(crate) pages_read: AtomicU64,
    pub(crate) pages_written: AtomicU64,
    pub(crate) log_forces: AtomicU64,
    pub(crate) commits: AtomicU64,
    pub(crate) aborts: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            evictions: load(&self.evictions),
            pages_read: load(&self.pages_read),
            pages_written: load(&self.pages_written),
            log_forces: load(&self.log_forces),
            commits: load(&self.commits),
            aborts: load(&self.aborts),
        }
    }
}

/// Plain copy of [`BufferPoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// `get_page` calls served from the cache.
    pub cache_hits: u64,
    /// `get_page` calls that went to a page store.
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    /// Includes stolen pages and write-backs on abort.
    pub pages_written: u64,
    pub log_forces: u64,
    pub commits: u64,
    pub aborts: u64,
}

impl StatsSnapshot {
    /// Share of lookups served from the cache; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.cache_hits + self.cache_misses {
            0 => 0.0,
            lookups => self.cache_hits as f64 / lookups as f64,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cache {}/{} hits ({:.1}%), {} evicted, {} read, {} written, {} forces, {} committed, {} aborted",
            self.cache_hits,
            self.cache_hits + self.cache_misses,
            self.hit_rate() * 100.0,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.log_forces,
            self.commits,
            self.aborts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_copies_counters() {
        let stats = BufferPoolStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());

        stats.cache_misses.fetch_add(2, Ordering::Relaxed);
        stats.pages_written.fetch_add(1, Ordering::Relaxed);
        stats.aborts.fetch_add(1, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        assert_eq!(snapshot.cache_misses, 2);
        assert_eq!(snapshot.pages_written, 1);
        assert_eq!(snapshot.aborts, 1);
        assert_eq!(snapshot.commits, 0);
    }

    #[test]
    fn test_hit_rate() {
        let mut snapshot = StatsSnapshot::default();
        assert_eq!(snapshot.hit_rate(), 0.0);

        snapshot.cache_hits = 3;
        snapshot.cache_misses = 1;
        assert_eq!(snapshot.hit_rate(), 0.75);
    }

    #[test]
    fn test_display() {
        let snapshot = StatsSnapshot {
            cache_hits: 3,
            cache_misses: 1,
            evictions: 1,
            pages_read: 1,
            pages_written: 2,
            log_forces: 2,
            commits: 1,
            aborts: 0,
        };
        assert_eq!(
            snapshot.to_string(),
            "cache 3/4 hits (75.0%), 1 evicted, 1 read, 2 written, 2 forces, 1 committed, 0 aborted"
        );
    }
}
