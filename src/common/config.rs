//! Configuration for pagelockdb.

use std::time::Duration;

/// Size of a page in bytes (4KB).
///
/// This value is chosen to match:
/// - OS page size on most systems (4096 bytes)
/// - Common database page sizes
///
/// # Alignment
/// Pages are aligned to 4096 bytes for efficient Direct I/O (O_DIRECT).
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool caches.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Default pause between retries of a denied lock request.
pub const DEFAULT_LOCK_RETRY: Duration = Duration::from_millis(10);

/// Whether a page dirtied by an uncommitted transaction may reach stable
/// storage before that transaction commits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Dirty pages are never evicted. Commit forces the transaction's
    /// pages to their stores (FORCE).
    #[default]
    NoSteal,
    /// Any page may be evicted; dirty victims are logged and then written.
    /// Commit only forces the log (NO-FORCE).
    Steal,
}

/// How the buffer pool picks a victim among the evictable pages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementPolicy {
    /// Uniformly random among evictable pages.
    #[default]
    Random,
    /// Oldest resident page first.
    Fifo,
    /// Least recently accessed page first.
    Lru,
}

/// Tunables of a [`BufferPool`](crate::buffer::BufferPool).
///
/// # Example
/// ```
/// use std::time::Duration;
/// use pagelockdb::common::config::{BufferPoolConfig, EvictionPolicy};
///
/// let config = BufferPoolConfig::new(8)
///     .with_lock_retry_interval(Duration::from_millis(2))
///     .with_eviction_policy(EvictionPolicy::Steal);
/// assert_eq!(config.capacity, 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Maximum number of resident pages.
    pub capacity: usize,
    /// Sleep between retries of a blocked lock request.
    pub lock_retry_interval: Duration,
    /// Steal or no-steal.
    pub eviction_policy: EvictionPolicy,
    /// Victim selection among eligible pages.
    pub replacement_policy: ReplacementPolicy,
}

impl BufferPoolConfig {
    /// Default configuration with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn with_lock_retry_interval(mut self, interval: Duration) -> Self {
        self.lock_retry_interval = interval;
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_replacement_policy(mut self, policy: ReplacementPolicy) -> Self {
        self.replacement_policy = policy;
        self
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_PAGES,
            lock_retry_interval: DEFAULT_LOCK_RETRY,
            eviction_policy: EvictionPolicy::default(),
            replacement_policy: ReplacementPolicy::default(),
        }
    }
}
