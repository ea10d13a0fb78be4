//! Transaction identifier type.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a transaction.
///
/// Ids come from a process-wide counter, so every call to
/// [`TransactionId::new`] yields a token that has never been handed out
/// before. A transaction's id lives until it commits or aborts.
///
/// # Example
/// ```
/// use pagelockdb::TransactionId;
///
/// let t1 = TransactionId::new();
/// let t2 = TransactionId::new();
/// assert_ne!(t1, t2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate a fresh transaction id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        TransactionId(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id, as written to the log.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Rebuild an id read back from the log.
    #[inline]
    pub(crate) fn from_raw(raw: u64) -> Self {
        TransactionId(raw)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn({})", self.0)
    }
}
