//! The page store contract the buffer pool consumes.

use crate::buffer::BufferPool;
use crate::common::{PageId, RecordId, Result, TableId, TransactionId};
use crate::storage::page::{Page, PageRef};

/// Per-table page file.
///
/// A store is the buffer pool's only source of truth for pages that are
/// not resident. The tuple entry points run *inside* a transaction: a
/// store fetches the pages it needs through `pool` (which takes the
/// locks) and returns every page it modified so the pool can mark them
/// dirty.
///
/// Stores must not hold a page's `RwLock` guard while calling back into
/// the pool.
pub trait PageStore: Send + Sync {
    /// The table this store backs.
    fn table_id(&self) -> TableId;

    /// Read a page from stable storage.
    ///
    /// # Errors
    /// `Error::PageNotFound` if the page does not exist.
    fn read_page(&self, page_id: PageId) -> Result<Page>;

    /// Write a page's current content to stable storage.
    fn write_page(&self, page: &Page) -> Result<()>;

    /// Number of pages on stable storage.
    fn page_count(&self) -> Result<u32>;

    /// Insert a tuple, returning every page that was modified.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &[u8],
    ) -> Result<Vec<PageRef>>;

    /// Delete the tuple at `rid`, returning the modified page.
    fn delete_tuple(&self, pool: &BufferPool, tid: TransactionId, rid: RecordId)
        -> Result<PageRef>;

    /// Overwrite the tuple at `rid`, returning the modified page.
    fn update_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        rid: RecordId,
        tuple: &[u8],
    ) -> Result<PageRef>;
}
