//! Buffer Pool - the transactional page cache.
//!
//! The [`BufferPool`] provides:
//! - Page caching between page stores and memory, bounded by capacity
//! - Page-level locking through the [`LockManager`]
//! - Steal / no-steal eviction with pluggable victim selection
//! - Write-ahead logging of every page write
//! - Commit and abort with before-image restore

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::buffer::replacer::{make_replacer, Replacer};
use crate::buffer::BufferPoolStats;
use crate::common::config::{BufferPoolConfig, EvictionPolicy, ReplacementPolicy};
use crate::common::{Error, PageId, RecordId, Result, TableId, TransactionId};
use crate::concurrency::{LockManager, Permissions};
use crate::recovery::LogManager;
use crate::storage::{Catalog, Page, PageImage, PageRef};

/// Everything guarded by the cache mutex.
struct CacheState {
    /// Resident pages. Never holds more than `capacity` entries.
    pages: HashMap<PageId, PageRef>,

    /// Victim selection among resident pages.
    replacer: Box<dyn Replacer>,

    /// Per active writer: the pre-transaction image of every page of
    /// theirs that was written to its store before they completed.
    /// An entry exists from a transaction's first write until it
    /// completes.
    stolen: HashMap<TransactionId, HashMap<PageId, PageImage>>,
}

/// Caches pages for transactions and mediates all access to them.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                         BufferPool                           │
/// │  ┌─────────────────────── cache: Mutex ───────────────────┐  │
/// │  │  pages: PageId → Arc<RwLock<Page>>   replacer   stolen │  │
/// │  └────────────────────────────────────────────────────────┘  │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐        │
/// │  │ lock_manager │  │   catalog    │  │     log      │        │
/// │  │  own Mutex   │  │ → PageStore  │  │  LogManager  │        │
/// │  └──────────────┘  └──────────────┘  └──────────────┘        │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `cache`: one coarse `Mutex`, held for structural changes and the I/O
///   of a miss or eviction, never while waiting for a page lock
/// - page content: each page's own `RwLock`, always taken after `cache`
/// - `lock_manager`: its own mutex, never held together with the above
/// - `stats`: atomic counters
///
/// # Transactions
/// A transaction fetches every page through [`get_page`](Self::get_page),
/// which blocks until the requested lock is granted. Locks are held until
/// [`transaction_complete`](Self::transaction_complete). A transaction
/// that receives `Error::TransactionAborted` has already been rolled back
/// and must not retry the request.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use pagelockdb::common::config::BufferPoolConfig;
/// use pagelockdb::concurrency::Permissions;
/// use pagelockdb::recovery::NullLogManager;
/// use pagelockdb::storage::{HeapFile, TableRegistry};
/// use pagelockdb::{BufferPool, TableId, TransactionId};
///
/// let dir = tempfile::tempdir()?;
/// let table = TableId::new(1);
/// let registry = Arc::new(TableRegistry::new());
/// registry.register(Arc::new(HeapFile::create(dir.path().join("t1"), table, 8)?));
///
/// let pool = BufferPool::new(BufferPoolConfig::new(4), registry, Arc::new(NullLogManager));
/// let tid = TransactionId::new();
/// pool.insert_tuple(tid, table, b"12345678")?;
/// pool.transaction_complete(tid, true)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct BufferPool {
    config: BufferPoolConfig,
    cache: Mutex<CacheState>,
    lock_manager: LockManager,
    catalog: Arc<dyn Catalog>,
    log: Arc<dyn LogManager>,
    stats: BufferPoolStats,
}

impl BufferPool {
    /// Create a buffer pool.
    ///
    /// # Arguments
    /// * `config` - Capacity, lock retry interval and policies
    /// * `catalog` - Resolves a page's table to its store
    /// * `log` - Write-ahead log consulted before every page write
    ///
    /// # Panics
    /// Panics if `config.capacity` is 0.
    pub fn new(config: BufferPoolConfig, catalog: Arc<dyn Catalog>, log: Arc<dyn LogManager>) -> Self {
        assert!(config.capacity > 0, "capacity must be > 0");

        Self {
            cache: Mutex::new(CacheState {
                pages: HashMap::with_capacity(config.capacity),
                replacer: make_replacer(config.replacement_policy),
                stolen: HashMap::new(),
            }),
            lock_manager: LockManager::new(config.lock_retry_interval),
            catalog,
            log,
            stats: BufferPoolStats::new(),
            config,
        }
    }

    // ========================================================================
    // Public API: Page access
    // ========================================================================

    /// Fetch a page on behalf of `tid` with the given permissions.
    ///
    /// The page is made resident first (evicting if the pool is full),
    /// then the lock is acquired, blocking while another transaction holds
    /// a conflicting lock.
    ///
    /// Only changes made through [`insert_tuple`](Self::insert_tuple),
    /// [`delete_tuple`](Self::delete_tuple) or
    /// [`update_tuple`](Self::update_tuple) mark the page dirty and reach
    /// its store. Bytes written directly through the handle stay in the
    /// cache and are rolled back on abort.
    ///
    /// # Errors
    /// - `Error::TransactionAborted` if waiting would deadlock; `tid` has
    ///   been rolled back and its locks released
    /// - `Error::BufferPoolExhausted` if no page can be evicted
    /// - `Error::PageNotFound` / `Error::TableNotFound` from the catalog or store
    pub fn get_page(&self, tid: TransactionId, page_id: PageId, perm: Permissions) -> Result<PageRef> {
        loop {
            let page = {
                let mut cache = self.cache.lock();
                self.fetch_locked(&mut cache, page_id)?
            };

            match self.lock_manager.acquire_lock(tid, page_id, perm) {
                Ok(()) => {}
                Err(Error::Deadlock(_)) => {
                    self.transaction_complete(tid, false)?;
                    return Err(Error::TransactionAborted(tid));
                }
                Err(err) => return Err(err),
            }

            // The page may have been evicted or replaced while we waited
            let cache = self.cache.lock();
            if let Some(resident) = cache.pages.get(&page_id) {
                if Arc::ptr_eq(resident, &page) {
                    return Ok(page);
                }
            }
        }
    }

    /// Release `tid`'s lock on a page before the transaction ends.
    ///
    /// This breaks two-phase locking; only use it for pages the
    /// transaction has read but not modified.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release_lock(tid, page_id);
    }

    /// Returns true if `tid` holds any lock on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    // ========================================================================
    // Public API: Tuple operations
    // ========================================================================

    /// Insert a tuple into `table` on behalf of `tid`.
    ///
    /// The table's store picks the page (taking the locks through this
    /// pool); every page it modified is marked dirty by `tid`.
    pub fn insert_tuple(&self, tid: TransactionId, table: TableId, tuple: &[u8]) -> Result<()> {
        let store = self.catalog.store_for(table)?;
        let pages = store.insert_tuple(self, tid, tuple)?;
        self.install_dirty(tid, pages)
    }

    /// Delete the tuple at `rid` on behalf of `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, rid: RecordId) -> Result<()> {
        let store = self.catalog.store_for(rid.page_id.table)?;
        let page = store.delete_tuple(self, tid, rid)?;
        self.install_dirty(tid, vec![page])
    }

    /// Overwrite the tuple at `rid` on behalf of `tid`.
    pub fn update_tuple(&self, tid: TransactionId, rid: RecordId, tuple: &[u8]) -> Result<()> {
        let store = self.catalog.store_for(rid.page_id.table)?;
        let page = store.update_tuple(self, tid, rid, tuple)?;
        self.install_dirty(tid, vec![page])
    }

    // ========================================================================
    // Public API: Transaction completion
    // ========================================================================

    /// Commit or abort `tid` and release all of its locks.
    ///
    /// Commit under `NoSteal` writes every page `tid` dirtied to its store
    /// (FORCE). Commit under `Steal` only logs them (NO-FORCE). Either way
    /// the commit record is forced before locks are released and every
    /// page's before-image is advanced to its current content.
    ///
    /// Abort restores every page `tid` locked or dirtied to its
    /// before-image. Pages that were stolen get their pre-transaction
    /// image written back.
    ///
    /// Completing a transaction that holds nothing is a no-op, so a
    /// second call after commit or abort does nothing.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let has_locks = !self.lock_manager.pages_locked_by(tid).is_empty();
        let has_writes = self.cache.lock().stolen.contains_key(&tid);
        if !has_locks && !has_writes {
            return Ok(());
        }

        if commit {
            match self.config.eviction_policy {
                EvictionPolicy::NoSteal => self.flush_pages(tid)?,
                EvictionPolicy::Steal => self.log_pages(tid)?,
            }
            self.log.log_commit(tid)?;
            self.log.force()?;
            self.stats.log_forces.fetch_add(1, Ordering::Relaxed);
            self.release_all_locks(tid, true)?;
            self.stats.commits.fetch_add(1, Ordering::Relaxed);
            debug!(%tid, "transaction committed");
        } else {
            self.release_all_locks(tid, false)?;
            self.log.log_abort(tid)?;
            self.stats.aborts.fetch_add(1, Ordering::Relaxed);
            debug!(%tid, "transaction aborted");
        }
        Ok(())
    }

    /// Settle `tid`'s pages and release its locks.
    ///
    /// On commit every page it locked or dirtied gets its before-image
    /// advanced. On abort every page it locked or dirtied is rolled back. A second
    /// call finds nothing to do.
    pub fn release_all_locks(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let locked = self.lock_manager.pages_locked_by(tid);
        {
            let mut cache = self.cache.lock();
            let stolen = cache.stolen.remove(&tid).unwrap_or_default();

            if commit {
                for page in cache.pages.values() {
                    let mut page = page.write();
                    if page.is_dirty() == Some(tid) || locked.contains(&page.id()) {
                        page.set_before_image();
                    }
                }
            } else {
                if let Err(err) = self.write_back(&stolen) {
                    cache.stolen.insert(tid, stolen);
                    return Err(err);
                }
                for page in cache.pages.values() {
                    let mut page = page.write();
                    if let Some(image) = stolen.get(&page.id()) {
                        page.restore_from(image);
                    } else if page.is_dirty() == Some(tid) || locked.contains(&page.id()) {
                        page.rollback(tid);
                    }
                }
            }
        }

        self.lock_manager.release_all(tid);
        Ok(())
    }

    /// Write pre-transaction images of stolen pages back to their stores.
    fn write_back(&self, stolen: &HashMap<PageId, PageImage>) -> Result<()> {
        for (&page_id, image) in stolen {
            let store = self.catalog.store_for(page_id.table)?;
            store.write_page(&Page::new(page_id, image.snapshot()))?;
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
            debug!(page = %page_id, "restored stolen page");
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Flush and log
    // ========================================================================

    /// Write a page to its store if it is resident and dirty.
    ///
    /// The update record is forced to the log first.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let mut cache = self.cache.lock();
        let Some(page) = cache.pages.get(&page_id).cloned() else {
            return Ok(());
        };
        self.flush_locked(&mut cache.stolen, &page)
    }

    /// Write every dirty resident page to its store.
    ///
    /// Pages dirtied by transactions that have not completed are written
    /// too; they remain recoverable through their log records.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        let CacheState { pages, stolen, .. } = &mut *cache;
        for page in pages.values() {
            self.flush_locked(stolen, page)?;
        }
        Ok(())
    }

    /// Write every resident page `tid` dirtied to its store.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let mut cache = self.cache.lock();
        let CacheState { pages, stolen, .. } = &mut *cache;
        for page in pages.values() {
            if page.read().is_dirty() == Some(tid) {
                self.flush_locked(stolen, page)?;
            }
        }
        Ok(())
    }

    /// Append update records for every resident page `tid` dirtied and
    /// force the log, without writing the pages themselves.
    pub fn log_pages(&self, tid: TransactionId) -> Result<()> {
        let cache = self.cache.lock();
        for page in cache.pages.values() {
            let page = page.read();
            if page.is_dirty() == Some(tid) {
                self.log
                    .log_write(tid, page.id(), page.before_image(), page.data())?;
            }
        }
        self.log.force()?;
        self.stats.log_forces.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    // ========================================================================
    // Public API: Recovery primitives
    // ========================================================================

    /// Drop a page from the cache without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        let mut cache = self.cache.lock();
        if cache.pages.remove(&page_id).is_some() {
            cache.replacer.remove(page_id);
            debug!(page = %page_id, "discarded page");
        }
    }

    /// Install `page` as the resident copy of `page_id`, replacing any
    /// existing copy. Evicts first if the page is not resident and the
    /// pool is full.
    pub fn replace_page(&self, page_id: PageId, page: Page) -> Result<()> {
        debug_assert_eq!(page.id(), page_id);
        let mut cache = self.cache.lock();
        if !cache.pages.contains_key(&page_id) && cache.pages.len() >= self.config.capacity {
            self.evict_locked(&mut cache, Some(page_id))?;
        }
        cache.pages.insert(page_id, page.into_ref());
        cache.replacer.record_access(page_id);
        Ok(())
    }

    /// Evict one page, never `protect`.
    ///
    /// # Errors
    /// `Error::BufferPoolExhausted` if no page is eligible.
    pub fn evict_page(&self, protect: Option<PageId>) -> Result<()> {
        let mut cache = self.cache.lock();
        self.evict_locked(&mut cache, protect)
    }

    // ========================================================================
    // Public API: Configuration, stats and info
    // ========================================================================

    /// Swap the victim selection policy. Resident pages are carried over.
    pub fn set_replacement_policy(&self, policy: ReplacementPolicy) {
        let mut cache = self.cache.lock();
        let mut replacer = make_replacer(policy);
        let mut resident: Vec<PageId> = cache.pages.keys().copied().collect();
        resident.sort();
        for page_id in resident {
            replacer.record_access(page_id);
        }
        cache.replacer = replacer;
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    /// Number of resident pages.
    pub fn resident_count(&self) -> usize {
        self.cache.lock().pages.len()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.cache.lock().pages.contains_key(&page_id)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    // ========================================================================
    // Internal: Core cache logic
    // ========================================================================

    /// Return the resident copy of a page, reading it from its store on a miss.
    fn fetch_locked(&self, cache: &mut CacheState, page_id: PageId) -> Result<PageRef> {
        if let Some(page) = cache.pages.get(&page_id).cloned() {
            cache.replacer.record_access(page_id);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(page);
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let store = self.catalog.store_for(page_id.table)?;
        let page = store.read_page(page_id)?.into_ref();
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        if cache.pages.len() >= self.config.capacity {
            self.evict_locked(cache, None)?;
        }
        cache.pages.insert(page_id, Arc::clone(&page));
        cache.replacer.record_access(page_id);
        debug!(page = %page_id, "cache miss");
        Ok(page)
    }

    /// Mark `pages` dirty by `tid` and make each one the resident copy.
    fn install_dirty(&self, tid: TransactionId, pages: Vec<PageRef>) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.stolen.entry(tid).or_default();

        for page in pages {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(tid);
                guard.id()
            };

            let resident = cache.pages.get(&page_id).map(|r| Arc::ptr_eq(r, &page));
            match resident {
                Some(true) => {}
                Some(false) => {
                    cache.pages.insert(page_id, page);
                }
                None => {
                    if cache.pages.len() >= self.config.capacity {
                        self.evict_locked(&mut cache, Some(page_id))?;
                    }
                    cache.pages.insert(page_id, page);
                }
            }
            cache.replacer.record_access(page_id);
        }
        Ok(())
    }

    /// Evict one page chosen by the replacer.
    ///
    /// Under `NoSteal` only clean pages are eligible. Under `Steal` a dirty
    /// victim is flushed (log first) before it leaves the cache.
    fn evict_locked(&self, cache: &mut CacheState, protect: Option<PageId>) -> Result<()> {
        let steal = self.config.eviction_policy == EvictionPolicy::Steal;
        let CacheState {
            pages,
            replacer,
            stolen,
        } = cache;

        let victim = replacer.evict(&mut |page_id| {
            Some(page_id) != protect
                && (steal
                    || !pages
                        .get(&page_id)
                        .is_some_and(|page| page.read().is_dirty().is_some()))
        });
        let Some(victim) = victim else {
            warn!(resident = pages.len(), ?protect, "no page eligible for eviction");
            return Err(Error::BufferPoolExhausted);
        };

        if let Some(page) = pages.get(&victim).cloned() {
            if let Err(err) = self.flush_locked(stolen, &page) {
                replacer.record_access(victim);
                return Err(err);
            }
        }

        pages.remove(&victim);
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        debug!(page = %victim, "evicted page");
        Ok(())
    }

    /// Write a dirty page to its store: log record, force, then data.
    fn flush_locked(
        &self,
        stolen: &mut HashMap<TransactionId, HashMap<PageId, PageImage>>,
        page: &PageRef,
    ) -> Result<()> {
        let mut page = page.write();
        let Some(dirtier) = page.is_dirty() else {
            return Ok(());
        };
        let page_id = page.id();

        self.log
            .log_write(dirtier, page_id, page.before_image(), page.data())?;
        self.log.force()?;
        self.stats.log_forces.fetch_add(1, Ordering::Relaxed);

        self.catalog.store_for(page_id.table)?.write_page(&page)?;
        page.clear_dirty();
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);

        if let Some(images) = stolen.get_mut(&dirtier) {
            images
                .entry(page_id)
                .or_insert_with(|| page.before_image().snapshot());
        }
        debug!(page = %page_id, %dirtier, "flushed page");
        Ok(())
    }
}
