//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::{tempdir, TempDir};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use pagelockdb::common::config::BufferPoolConfig;
use pagelockdb::recovery::LogManager;
use pagelockdb::storage::{HeapFile, PageStore, TableRegistry};
use pagelockdb::{
    BufferPool, Page, PageId, PageImage, PageRef, RecordId, Result, TableId, TransactionId,
};

pub const TUPLE_SIZE: usize = 8;
pub const TABLE: TableId = TableId(1);

const ENV_NAME: &str = "PAGELOCKDB_LOG";

static INIT_LOGGING: Once = Once::new();

/// Install a `tracing` subscriber filtered by `PAGELOCKDB_LOG`
/// (default: warnings only). Safe to call from every test.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .with_env_var(ENV_NAME)
            .from_env_lossy();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn pid(n: u32) -> PageId {
    PageId::new(TABLE, n)
}

pub fn tuple(value: u64) -> [u8; TUPLE_SIZE] {
    value.to_le_bytes()
}

// ============================================================================
// Event recording
// ============================================================================

/// Something the pool asked a log or store to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    LogWrite(TransactionId, PageId),
    Force,
    Commit(TransactionId),
    Abort(TransactionId),
    PageWrite(PageId),
}

/// Ordered record of every log and store call, shared by
/// [`RecordingLog`] and [`RecordingStore`].
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<Event>>>);

impl Events {
    pub fn push(&self, event: Event) {
        self.0.lock().push(event);
    }

    pub fn all(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Every page write is preceded by a log record for that page and a
    /// later force, with no other page write in between.
    pub fn assert_log_before_data(&self) {
        let events = self.all();
        for (i, event) in events.iter().enumerate() {
            let Event::PageWrite(page_id) = *event else {
                continue;
            };
            let logged = events[..i]
                .iter()
                .rposition(|e| matches!(e, Event::LogWrite(_, p) if *p == page_id));
            let Some(logged) = logged else {
                panic!("{} written without a log record: {:?}", page_id, events);
            };
            assert!(
                events[logged..i].contains(&Event::Force),
                "{} written before its log record was forced: {:?}",
                page_id,
                events
            );
        }
    }
}

/// A [`LogManager`] that only records calls.
pub struct RecordingLog {
    pub events: Events,
}

impl LogManager for RecordingLog {
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        _before: &PageImage,
        _after: &PageImage,
    ) -> Result<()> {
        self.events.push(Event::LogWrite(tid, page_id));
        Ok(())
    }

    fn force(&self) -> Result<()> {
        self.events.push(Event::Force);
        Ok(())
    }

    fn log_commit(&self, tid: TransactionId) -> Result<()> {
        self.events.push(Event::Commit(tid));
        Ok(())
    }

    fn log_abort(&self, tid: TransactionId) -> Result<()> {
        self.events.push(Event::Abort(tid));
        Ok(())
    }
}

/// A [`HeapFile`] that records every page write.
pub struct RecordingStore {
    pub inner: Arc<HeapFile>,
    pub events: Events,
}

impl PageStore for RecordingStore {
    fn table_id(&self) -> TableId {
        self.inner.table_id()
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        self.inner.read_page(page_id)
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        self.events.push(Event::PageWrite(page.id()));
        self.inner.write_page(page)
    }

    fn page_count(&self) -> Result<u32> {
        self.inner.page_count()
    }

    fn insert_tuple(&self, pool: &BufferPool, tid: TransactionId, tuple: &[u8]) -> Result<Vec<PageRef>> {
        self.inner.insert_tuple(pool, tid, tuple)
    }

    fn delete_tuple(&self, pool: &BufferPool, tid: TransactionId, rid: RecordId) -> Result<PageRef> {
        self.inner.delete_tuple(pool, tid, rid)
    }

    fn update_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        rid: RecordId,
        tuple: &[u8],
    ) -> Result<PageRef> {
        self.inner.update_tuple(pool, tid, rid, tuple)
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// A pool over one recorded heap file with `pages` pages. Slot 0 of
/// page `n` holds `tuple(n)`; every other slot is free.
pub struct Fixture {
    pub pool: Arc<BufferPool>,
    pub file: Arc<HeapFile>,
    pub events: Events,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new(config: BufferPoolConfig, pages: u32) -> Self {
        init_logging();
        let dir = tempdir().unwrap();
        let file = Arc::new(HeapFile::create(dir.path().join("t1.tbl"), TABLE, TUPLE_SIZE).unwrap());
        for n in 0..pages {
            let page_id = file.allocate_page().unwrap();
            let mut page = Page::empty(page_id);
            page.as_mut_slice()[0] = 1;
            page.as_mut_slice()[1..=TUPLE_SIZE].copy_from_slice(&tuple(n as u64));
            file.write_page(&page).unwrap();
        }

        let events = Events::default();
        let registry = Arc::new(TableRegistry::new());
        registry.register(Arc::new(RecordingStore {
            inner: Arc::clone(&file),
            events: events.clone(),
        }));
        let log = Arc::new(RecordingLog {
            events: events.clone(),
        });

        let config = config.with_lock_retry_interval(Duration::from_millis(1));
        let pool = Arc::new(BufferPool::new(config, registry, log));
        Fixture {
            pool,
            file,
            events,
            dir,
        }
    }

    /// Value of slot 0 of a page as stored on disk.
    pub fn on_disk(&self, page_id: PageId) -> u64 {
        slot0(&self.file.read_page(page_id).unwrap())
    }

    /// All tuples visible to a fresh transaction, which then commits.
    pub fn scan(&self) -> Vec<(RecordId, Vec<u8>)> {
        let tid = TransactionId::new();
        let tuples = self.file.scan(&self.pool, tid).unwrap();
        self.pool.transaction_complete(tid, true).unwrap();
        tuples
    }
}

/// Value of the tuple in slot 0 of `page`.
pub fn slot0(page: &Page) -> u64 {
    image_slot0(page.data())
}

/// Value of the tuple in slot 0 of a raw page image.
pub fn image_slot0(image: &PageImage) -> u64 {
    let mut bytes = [0u8; TUPLE_SIZE];
    bytes.copy_from_slice(&image.as_slice()[1..=TUPLE_SIZE]);
    u64::from_le_bytes(bytes)
}

/// Overwrite the tuple in slot 0 of a page. The slot must be occupied.
pub fn write_slot0(pool: &BufferPool, tid: TransactionId, page_id: PageId, value: u64) -> Result<()> {
    pool.update_tuple(tid, RecordId::new(page_id, 0), &tuple(value))
}

/// Spin until `pool` has `n` transactions blocked on a lock.
pub fn wait_for_waiters(pool: &BufferPool, n: usize) {
    while pool.lock_manager().waiting_count() < n {
        std::thread::sleep(Duration::from_millis(1));
    }
}
