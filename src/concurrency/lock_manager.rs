//! Lock Manager - page-level two-phase locking with deadlock detection.
//!
//! The [`LockManager`] provides:
//! - Shared / exclusive page locks with in-place upgrade
//! - Blocking acquisition with a fixed retry interval
//! - Wait-for-graph cycle detection on every retry

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::common::{Error, PageId, Result, TransactionId};

use super::wait_for::WaitForGraph;

/// Access mode of a page lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    /// Read access. Any number of transactions may share it.
    Shared,
    /// Write access. Excludes every other transaction.
    Exclusive,
}

/// Lock state of one page. Only exists while at least one transaction
/// holds a lock on the page.
#[derive(Debug)]
struct PageLock {
    /// Strongest mode granted. `Exclusive` implies exactly one holder.
    mode: Permissions,
    holders: HashSet<TransactionId>,
}

/// Everything guarded by the lock manager's mutex.
#[derive(Debug, Default)]
struct LockTable {
    locks: HashMap<PageId, PageLock>,
    /// Reverse index: pages each transaction holds a lock on.
    held: HashMap<TransactionId, HashSet<PageId>>,
    waits_for: WaitForGraph,
}

impl LockTable {
    /// Grant `perm` on `page_id` to `tid` if the grant rules allow it.
    ///
    /// Shared: the requester already holds the page, the page is free, or
    /// all holders are shared. Exclusive: the page is free or the requester
    /// is its sole holder (upgrading in place if it held it shared).
    fn try_grant(&mut self, tid: TransactionId, page_id: PageId, perm: Permissions) -> bool {
        let grantable = match self.locks.get(&page_id) {
            None => true,
            Some(lock) => match perm {
                Permissions::Shared => {
                    lock.holders.contains(&tid) || lock.mode == Permissions::Shared
                }
                Permissions::Exclusive => lock.holders.len() == 1 && lock.holders.contains(&tid),
            },
        };
        if !grantable {
            return false;
        }

        let lock = self.locks.entry(page_id).or_insert_with(|| PageLock {
            mode: perm,
            holders: HashSet::new(),
        });
        lock.holders.insert(tid);
        if perm == Permissions::Exclusive {
            lock.mode = Permissions::Exclusive;
        }
        self.held.entry(tid).or_default().insert(page_id);
        true
    }

    fn release(&mut self, tid: TransactionId, page_id: PageId) {
        if let Some(pages) = self.held.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&tid);
            }
        }

        if let Some(lock) = self.locks.get_mut(&page_id) {
            lock.holders.remove(&tid);
            if lock.holders.is_empty() {
                self.locks.remove(&page_id);
            }
        }
    }

    /// Every holder of `page_id` other than `tid`.
    fn other_holders(&self, tid: TransactionId, page_id: PageId) -> Vec<TransactionId> {
        self.locks
            .get(&page_id)
            .map(|lock| lock.holders.iter().copied().filter(|&h| h != tid).collect())
            .unwrap_or_default()
    }
}

/// Counters kept by the lock manager.
///
/// All fields are atomic and use `Ordering::Relaxed`; they are
/// diagnostics, not synchronization.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Lock requests that were granted.
    pub grants: AtomicU64,
    /// Requests that had to wait at least once.
    pub waits: AtomicU64,
    /// Requests refused because of a wait-for cycle.
    pub deadlocks: AtomicU64,
}

impl LockStats {
    pub fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            grants: self.grants.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            deadlocks: self.deadlocks.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`LockStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatsSnapshot {
    pub grants: u64,
    pub waits: u64,
    pub deadlocks: u64,
}

impl fmt::Display for LockStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LockStats {{ grants: {}, waits: {}, deadlocks: {} }}",
            self.grants, self.waits, self.deadlocks
        )
    }
}

/// Owns the lock table and the wait-for graph.
///
/// # Thread Safety
/// All state lives behind one `parking_lot::Mutex`. The mutex is held
/// only while the table is inspected or changed, never while a denied
/// request sleeps, so blocked transactions do not stall releases.
///
/// # Fairness
/// There is no queue: a released lock goes to whichever waiter retries
/// first. Starvation is possible.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use pagelockdb::concurrency::{LockManager, Permissions};
/// use pagelockdb::{PageId, TableId, TransactionId};
///
/// let lm = LockManager::new(Duration::from_millis(1));
/// let (t1, t2) = (TransactionId::new(), TransactionId::new());
/// let pid = PageId::new(TableId::new(1), 0);
///
/// lm.acquire_lock(t1, pid, Permissions::Shared).unwrap();
/// lm.acquire_lock(t2, pid, Permissions::Shared).unwrap();
/// assert!(lm.holds_lock(t1, pid) && lm.holds_lock(t2, pid));
/// ```
pub struct LockManager {
    table: Mutex<LockTable>,
    retry_interval: Duration,
    stats: LockStats,
}

impl LockManager {
    /// Create a lock manager whose denied requests retry every `retry_interval`.
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            retry_interval,
            stats: LockStats::default(),
        }
    }

    /// Acquire `perm` on `page_id` for `tid`, blocking until granted.
    ///
    /// Each time the request is denied, `tid`'s wait edges are reset to
    /// the page's other holders and the wait-for graph is searched for a
    /// cycle reachable from `tid`.
    ///
    /// # Errors
    /// `Error::Deadlock` if waiting would close a cycle. The request is
    /// withdrawn; the caller must abort the transaction, not retry.
    pub fn acquire_lock(&self, tid: TransactionId, page_id: PageId, perm: Permissions) -> Result<()> {
        let mut waited = false;
        loop {
            {
                let mut table = self.table.lock();
                if table.try_grant(tid, page_id, perm) {
                    table.waits_for.clear(tid);
                    self.stats.grants.fetch_add(1, Ordering::Relaxed);
                    trace!(%tid, page = %page_id, ?perm, "lock granted");
                    return Ok(());
                }

                let holders = table.other_holders(tid, page_id);
                table.waits_for.set_waits(tid, holders);
                if table.waits_for.has_cycle_from(tid) {
                    table.waits_for.clear(tid);
                    self.stats.deadlocks.fetch_add(1, Ordering::Relaxed);
                    warn!(%tid, page = %page_id, ?perm, "deadlock detected");
                    return Err(Error::Deadlock(tid));
                }

                if !waited {
                    waited = true;
                    self.stats.waits.fetch_add(1, Ordering::Relaxed);
                    trace!(%tid, page = %page_id, ?perm, "lock request blocked");
                }
            }
            thread::sleep(self.retry_interval);
        }
    }

    /// Grant `perm` if possible right now, without waiting or touching
    /// the wait-for graph.
    pub fn try_lock(&self, tid: TransactionId, page_id: PageId, perm: Permissions) -> bool {
        let granted = self.table.lock().try_grant(tid, page_id, perm);
        if granted {
            self.stats.grants.fetch_add(1, Ordering::Relaxed);
        }
        granted
    }

    /// Release `tid`'s lock on `page_id`. No-op if it holds none.
    pub fn release_lock(&self, tid: TransactionId, page_id: PageId) {
        self.table.lock().release(tid, page_id);
    }

    /// Release every lock `tid` holds and drop its wait edges.
    ///
    /// Returns the pages that were released; empty on a second call.
    pub fn release_all(&self, tid: TransactionId) -> Vec<PageId> {
        let mut table = self.table.lock();
        let pages: Vec<PageId> = table
            .held
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        for &page_id in &pages {
            table.release(tid, page_id);
        }
        table.waits_for.clear(tid);
        pages
    }

    /// Returns true if `tid` holds any lock on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.table
            .lock()
            .locks
            .get(&page_id)
            .is_some_and(|lock| lock.holders.contains(&tid))
    }

    /// The mode `page_id` is locked in, or `None` if it is free.
    pub fn lock_mode(&self, page_id: PageId) -> Option<Permissions> {
        self.table.lock().locks.get(&page_id).map(|lock| lock.mode)
    }

    /// Current holders of `page_id`.
    pub fn holders(&self, page_id: PageId) -> Vec<TransactionId> {
        self.table
            .lock()
            .locks
            .get(&page_id)
            .map(|lock| lock.holders.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Pages `tid` holds a lock on, sorted.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .table
            .lock()
            .held
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Number of transactions with a pending lock request.
    pub fn waiting_count(&self) -> usize {
        self.table.lock().waits_for.waiting()
    }

    pub fn stats(&self) -> &LockStats {
        &self.stats
    }
}
