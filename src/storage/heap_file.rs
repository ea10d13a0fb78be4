//! Heap file - a table stored as a flat file of fixed-width tuple slots.
//!
//! [`HeapFile`] is the file-backed [`PageStore`]:
//! - Reading and writing pages
//! - Appending new pages when every page is full
//! - Slot-level tuple insert / delete / update through the buffer pool

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::BufferPool;
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result, TableId, TransactionId};
use crate::concurrency::Permissions;
use crate::storage::page::{Page, PageImage, PageRef};
use crate::storage::PageStore;

/// A table stored in a single file.
///
/// # File Layout
/// Pages are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// # Page Layout
/// Each page is an array of `1 + tuple_size` byte slots. The first byte
/// of a slot is 1 when the slot is occupied.
///
/// # Thread Safety
/// File access is serialized through an internal mutex, so a `HeapFile`
/// can be shared between the catalog and many transactions.
///
/// # Durability
/// Every page write and allocation is followed by `fsync()`.
pub struct HeapFile {
    table_id: TableId,
    tuple_size: usize,
    state: Mutex<FileState>,
}

struct FileState {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
}

impl HeapFile {
    /// Create a new table file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    ///
    /// # Panics
    /// Panics if `tuple_size` is 0 or does not leave room for a slot flag.
    pub fn create<P: AsRef<Path>>(path: P, table_id: TableId, tuple_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::with_file(file, 0, table_id, tuple_size))
    }

    /// Open an existing table file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, table_id: TableId, tuple_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Calculate page count from file size
        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self::with_file(file, page_count, table_id, tuple_size))
    }

    /// Open an existing table file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(
        path: P,
        table_id: TableId,
        tuple_size: usize,
    ) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, table_id, tuple_size)
        } else {
            Self::create(path, table_id, tuple_size)
        }
    }

    fn with_file(file: File, page_count: u32, table_id: TableId, tuple_size: usize) -> Self {
        assert!(
            tuple_size > 0 && tuple_size < PAGE_SIZE,
            "tuple_size must be in 1..PAGE_SIZE"
        );
        Self {
            table_id,
            tuple_size,
            state: Mutex::new(FileState { file, page_count }),
        }
    }

    /// Append a zeroed page to the file.
    ///
    /// The new page is durable before its id is returned.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut state = self.state.lock();
        let page_id = PageId::new(self.table_id, state.page_count);

        let offset = (page_id.page_no as u64) * (PAGE_SIZE as u64);
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(&[0u8; PAGE_SIZE])?;
        state.file.sync_all()?;

        state.page_count += 1;
        debug!(page = %page_id, "allocated page");
        Ok(page_id)
    }

    /// Get the total size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        (self.state.lock().page_count as u64) * (PAGE_SIZE as u64)
    }

    /// Width of one tuple in bytes.
    #[inline]
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Number of tuple slots on each page.
    #[inline]
    pub fn slots_per_page(&self) -> usize {
        (PAGE_SIZE / self.slot_width()).min(u16::MAX as usize)
    }

    /// The tuple stored in `slot`, if the slot is occupied.
    pub fn read_tuple<'a>(&self, page: &'a Page, slot: u16) -> Option<&'a [u8]> {
        if slot as usize >= self.slots_per_page() {
            return None;
        }
        let range = self.slot_range(slot);
        let bytes = &page.as_slice()[range];
        (bytes[0] == 1).then(|| &bytes[1..])
    }

    /// Read every tuple of the table under `Shared` locks.
    pub fn scan(&self, pool: &BufferPool, tid: TransactionId) -> Result<Vec<(RecordId, Vec<u8>)>> {
        let mut tuples = Vec::new();
        for page_no in 0..self.page_count()? {
            let pid = PageId::new(self.table_id, page_no);
            let page = pool.get_page(tid, pid, Permissions::Shared)?;
            let page = page.read();
            for slot in 0..self.slots_per_page() as u16 {
                if let Some(tuple) = self.read_tuple(&page, slot) {
                    tuples.push((RecordId::new(pid, slot), tuple.to_vec()));
                }
            }
        }
        Ok(tuples)
    }

    #[inline]
    fn slot_width(&self) -> usize {
        self.tuple_size + 1
    }

    fn slot_range(&self, slot: u16) -> Range<usize> {
        let start = slot as usize * self.slot_width();
        start..start + self.slot_width()
    }

    fn free_slot(&self, page: &Page) -> Option<u16> {
        (0..self.slots_per_page() as u16).find(|&slot| self.read_tuple(page, slot).is_none())
    }

    fn write_slot(&self, page: &mut Page, slot: u16, tuple: &[u8]) {
        let range = self.slot_range(slot);
        let bytes = &mut page.as_mut_slice()[range];
        bytes[0] = 1;
        bytes[1..].copy_from_slice(tuple);
    }

    fn check_tuple(&self, tuple: &[u8]) -> Result<()> {
        if tuple.len() != self.tuple_size {
            return Err(Error::TupleSizeMismatch {
                expected: self.tuple_size,
                actual: tuple.len(),
            });
        }
        Ok(())
    }

    fn check_record(&self, rid: RecordId) -> Result<()> {
        if rid.page_id.table != self.table_id || rid.slot as usize >= self.slots_per_page() {
            return Err(Error::RecordNotFound(rid));
        }
        Ok(())
    }

    fn check_page(&self, page_id: PageId, page_count: u32) -> Result<()> {
        if page_id.table != self.table_id || page_id.page_no >= page_count {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }
}

impl PageStore for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        let mut state = self.state.lock();
        self.check_page(page_id, state.page_count)?;

        let offset = (page_id.page_no as u64) * (PAGE_SIZE as u64);
        state.file.seek(SeekFrom::Start(offset))?;

        let mut image = PageImage::new();
        state.file.read_exact(image.as_mut_slice())?;

        Ok(Page::new(page_id, image))
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let mut state = self.state.lock();
        self.check_page(page.id(), state.page_count)?;

        let offset = (page.id().page_no as u64) * (PAGE_SIZE as u64);
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(page.as_slice())?;
        state.file.sync_all()?;

        Ok(())
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.state.lock().page_count)
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &[u8],
    ) -> Result<Vec<PageRef>> {
        self.check_tuple(tuple)?;

        for page_no in 0..self.page_count()? {
            let pid = PageId::new(self.table_id, page_no);
            let held_before = pool.holds_lock(tid, pid);

            // Probe under a shared lock; only pages with room get upgraded.
            let page = pool.get_page(tid, pid, Permissions::Shared)?;
            let has_room = self.free_slot(&page.read()).is_some();
            if !has_room {
                if !held_before {
                    pool.release_page(tid, pid);
                }
                continue;
            }

            let page = pool.get_page(tid, pid, Permissions::Exclusive)?;
            let slot = {
                let mut guard = page.write();
                let slot = self.free_slot(&guard);
                if let Some(slot) = slot {
                    self.write_slot(&mut guard, slot, tuple);
                }
                slot
            };
            if slot.is_some() {
                return Ok(vec![page]);
            }
        }

        let pid = self.allocate_page()?;
        let page = pool.get_page(tid, pid, Permissions::Exclusive)?;
        self.write_slot(&mut page.write(), 0, tuple);
        Ok(vec![page])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        rid: RecordId,
    ) -> Result<PageRef> {
        self.check_record(rid)?;
        let page = pool.get_page(tid, rid.page_id, Permissions::Exclusive)?;
        {
            let mut guard = page.write();
            if self.read_tuple(&guard, rid.slot).is_none() {
                return Err(Error::RecordNotFound(rid));
            }
            let range = self.slot_range(rid.slot);
            guard.as_mut_slice()[range].fill(0);
        }
        Ok(page)
    }

    fn update_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        rid: RecordId,
        tuple: &[u8],
    ) -> Result<PageRef> {
        self.check_tuple(tuple)?;
        self.check_record(rid)?;
        let page = pool.get_page(tid, rid.page_id, Permissions::Exclusive)?;
        {
            let mut guard = page.write();
            if self.read_tuple(&guard, rid.slot).is_none() {
                return Err(Error::RecordNotFound(rid));
            }
            self.write_slot(&mut guard, rid.slot, tuple);
        }
        Ok(page)
    }
}
