//! Error types for pagelockdb.

use thiserror::Error;

use super::{PageId, RecordId, TableId, TransactionId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in pagelockdb.
///
/// A single error type keeps handling uniform across the cache, the lock
/// manager, the page stores and the log.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a page store or the log.
    ///
    /// Propagated unchanged; the buffer pool never retries I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on stable storage.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// No page store is registered for the table.
    #[error("{0} not found in catalog")]
    TableNotFound(TableId),

    /// The record id does not name an occupied slot.
    #[error("record {0} not found")]
    RecordNotFound(RecordId),

    /// A tuple does not match the fixed tuple width of its table.
    #[error("tuple size mismatch: expected {expected} bytes, got {actual}")]
    TupleSizeMismatch { expected: usize, actual: usize },

    /// A wait-for cycle was found while `tid` was waiting for a lock.
    ///
    /// Only the lock manager produces this. The buffer pool converts it
    /// into [`Error::TransactionAborted`] before it reaches callers.
    #[error("deadlock detected while {0} was waiting for a lock")]
    Deadlock(TransactionId),

    /// The transaction has been rolled back and must be restarted.
    #[error("{0} was aborted and must be restarted")]
    TransactionAborted(TransactionId),

    /// No clean page can be evicted under the no-steal policy.
    #[error("all buffer pool slots contain dirty pages; COMMIT or ROLLBACK to continue")]
    BufferPoolExhausted,

    /// A log record failed its checksum somewhere other than the log tail.
    #[error("corrupt log record at offset {offset}")]
    CorruptLogRecord { offset: u64 },
}

impl Error {
    /// Returns true if the caller should roll back and restart the transaction.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::TransactionAborted(_) | Error::Deadlock(_))
    }
}
