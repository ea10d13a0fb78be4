//! Crash recovery from the write-ahead log.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info};

use crate::buffer::BufferPool;
use crate::common::{Result, TransactionId};
use crate::storage::Page;

use super::{FileLogManager, LogRecord};

/// What a recovery pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Update records re-applied for committed transactions.
    pub redone: usize,
    /// Update records rolled back for transactions that never committed.
    pub undone: usize,
    /// Transactions with a commit record, sorted.
    pub winners: Vec<TransactionId>,
    /// Transactions with updates but no commit record, sorted.
    pub losers: Vec<TransactionId>,
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Recovery {{ redone: {}, undone: {}, winners: {}, losers: {} }}",
            self.redone,
            self.undone,
            self.winners.len(),
            self.losers.len()
        )
    }
}

/// Bring every store back to a transaction-consistent state.
///
/// Runs in two passes over the log:
/// 1. Undo: the before-image of every loser update, newest first, is
///    written to its store and the page is dropped from the cache.
/// 2. Redo: the after-image of every winner update, oldest first, is
///    written to its store and installed in the cache if resident.
///
/// A winner's after-image is always the last write to its page.
///
/// Must run before any transaction uses `pool`.
///
/// # Errors
/// `Error::CorruptLogRecord` if the log is damaged before its tail, plus
/// catalog and store errors.
pub fn recover(log: &FileLogManager, pool: &BufferPool) -> Result<RecoveryReport> {
    let records = log.records()?;

    let winners: HashSet<TransactionId> = records
        .iter()
        .filter_map(|record| match record {
            LogRecord::Commit { tid } => Some(*tid),
            _ => None,
        })
        .collect();

    let mut report = RecoveryReport::default();
    let mut losers = HashSet::new();

    for record in records.iter().rev() {
        let LogRecord::Update {
            tid,
            page_id,
            before,
            ..
        } = record
        else {
            continue;
        };
        if winners.contains(tid) {
            continue;
        }
        let store = pool.catalog().store_for(page_id.table)?;
        store.write_page(&Page::new(*page_id, before.snapshot()))?;
        pool.discard_page(*page_id);
        losers.insert(*tid);
        report.undone += 1;
        debug!(%tid, page = %page_id, "undo");
    }

    for record in &records {
        let LogRecord::Update {
            tid,
            page_id,
            after,
            ..
        } = record
        else {
            continue;
        };
        if !winners.contains(tid) {
            continue;
        }
        let store = pool.catalog().store_for(page_id.table)?;
        store.write_page(&Page::new(*page_id, after.snapshot()))?;
        if pool.is_resident(*page_id) {
            pool.replace_page(*page_id, Page::new(*page_id, after.snapshot()))?;
        }
        report.redone += 1;
        debug!(%tid, page = %page_id, "redo");
    }

    report.winners = winners.into_iter().collect();
    report.winners.sort();
    report.losers = losers.into_iter().collect();
    report.losers.sort();

    info!(%report, "recovery complete");
    Ok(report)
}
