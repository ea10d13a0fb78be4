//! Write-ahead log.
//!
//! The buffer pool talks to the log through the [`LogManager`] trait:
//! every dirty page is described by an update record (before and after
//! image) that is forced to stable storage before the page itself is
//! written. [`FileLogManager`] is the on-disk implementation;
//! [`NullLogManager`] discards everything.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result, TableId, TransactionId};
use crate::storage::PageImage;

/// Write-ahead log consumed by the buffer pool.
pub trait LogManager: Send + Sync {
    /// Append an update record for `page_id`, dirtied by `tid`.
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before: &PageImage,
        after: &PageImage,
    ) -> Result<()>;

    /// Make every appended record durable.
    fn force(&self) -> Result<()>;

    /// Append a commit record for `tid`.
    fn log_commit(&self, _tid: TransactionId) -> Result<()> {
        Ok(())
    }

    /// Append an abort record for `tid`.
    fn log_abort(&self, _tid: TransactionId) -> Result<()> {
        Ok(())
    }
}

/// A log that records nothing. Suitable for a pool that never steals and
/// has no crash recovery requirement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogManager;

impl LogManager for NullLogManager {
    fn log_write(&self, _: TransactionId, _: PageId, _: &PageImage, _: &PageImage) -> Result<()> {
        Ok(())
    }

    fn force(&self) -> Result<()> {
        Ok(())
    }
}

/// A decoded log record.
#[derive(Debug, PartialEq, Eq)]
pub enum LogRecord {
    Update {
        tid: TransactionId,
        page_id: PageId,
        before: Box<PageImage>,
        after: Box<PageImage>,
    },
    Commit {
        tid: TransactionId,
    },
    Abort {
        tid: TransactionId,
    },
}

// ============================================================================
// Record framing
// ============================================================================
//
// ┌──────┬─────────┬──────────────────────────┬─────────┐
// │ kind │   tid   │         payload          │  crc32  │
// │  u8  │   u64   │                          │   u32   │
// └──────┴─────────┴──────────────────────────┴─────────┘
//
// Update payload: table u32, page_no u32, before image, after image.
// Commit and abort records have no payload. Integers are little-endian;
// the CRC covers every byte before it.

const KIND_UPDATE: u8 = 1;
const KIND_COMMIT: u8 = 2;
const KIND_ABORT: u8 = 3;

const HEADER_SIZE: usize = 1 + 8;
const CRC_SIZE: usize = 4;
const UPDATE_PAYLOAD_SIZE: usize = 4 + 4 + 2 * PAGE_SIZE;

fn record_len(kind: u8) -> Option<usize> {
    match kind {
        KIND_UPDATE => Some(HEADER_SIZE + UPDATE_PAYLOAD_SIZE + CRC_SIZE),
        KIND_COMMIT | KIND_ABORT => Some(HEADER_SIZE + CRC_SIZE),
        _ => None,
    }
}

fn encode(kind: u8, tid: TransactionId, payload: &[&[u8]]) -> Vec<u8> {
    let payload_len: usize = payload.iter().map(|p| p.len()).sum();
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload_len + CRC_SIZE);
    buf.push(kind);
    buf.extend_from_slice(&tid.as_u64().to_le_bytes());
    for part in payload {
        buf.extend_from_slice(part);
    }
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(word)
}

/// Decode one complete, CRC-verified record.
fn decode(kind: u8, record: &[u8]) -> LogRecord {
    let tid = TransactionId::from_raw(read_u64(record, 1));
    match kind {
        KIND_UPDATE => {
            let table = TableId::new(read_u32(record, HEADER_SIZE));
            let page_no = read_u32(record, HEADER_SIZE + 4);
            let images = HEADER_SIZE + 8;
            LogRecord::Update {
                tid,
                page_id: PageId::new(table, page_no),
                before: Box::new(PageImage::from_bytes(&record[images..images + PAGE_SIZE])),
                after: Box::new(PageImage::from_bytes(
                    &record[images + PAGE_SIZE..images + 2 * PAGE_SIZE],
                )),
            }
        }
        KIND_COMMIT => LogRecord::Commit { tid },
        _ => LogRecord::Abort { tid },
    }
}

/// Decode every record in `bytes`.
///
/// A truncated or checksum-failing record at the very end of the log is a
/// torn write and ends the scan. The same damage anywhere else is
/// reported as `Error::CorruptLogRecord`.
fn decode_all(bytes: &[u8]) -> Result<Vec<LogRecord>> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let Some(len) = record_len(rest[0]) else {
            return Err(Error::CorruptLogRecord {
                offset: offset as u64,
            });
        };
        if rest.len() < len {
            warn!(offset, "torn record at log tail");
            break;
        }

        let (body, crc) = rest[..len].split_at(len - CRC_SIZE);
        if crc32fast::hash(body) != read_u32(crc, 0) {
            if offset + len == bytes.len() {
                warn!(offset, "torn record at log tail");
                break;
            }
            return Err(Error::CorruptLogRecord {
                offset: offset as u64,
            });
        }

        records.push(decode(rest[0], body));
        offset += len;
    }

    Ok(records)
}

// ============================================================================
// FileLogManager
// ============================================================================

/// Append-only log file.
///
/// Records are buffered in memory until [`force`](LogManager::force),
/// which flushes the buffer and calls `fsync()` on the file.
///
/// # Example
/// ```no_run
/// use pagelockdb::recovery::{FileLogManager, LogManager};
/// use pagelockdb::TransactionId;
///
/// let log = FileLogManager::open("wal.log")?;
/// log.log_commit(TransactionId::new())?;
/// log.force()?;
/// # Ok::<(), pagelockdb::Error>(())
/// ```
pub struct FileLogManager {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileLogManager {
    /// Open the log at `path`, creating it if needed. New records are
    /// appended after any existing ones.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every durable record, oldest first.
    ///
    /// Records still sitting in the write buffer are flushed first.
    ///
    /// # Errors
    /// `Error::CorruptLogRecord` if a record before the tail fails its checksum.
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        self.writer.lock().flush()?;
        let bytes = std::fs::read(&self.path)?;
        decode_all(&bytes)
    }

    /// Discard every record. Used once recovery has made the stores
    /// consistent.
    pub fn truncate(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        let file = writer.get_ref();
        file.set_len(0)?;
        file.sync_all()?;
        debug!(path = %self.path.display(), "log truncated");
        Ok(())
    }

    fn append(&self, record: &[u8]) -> Result<()> {
        self.writer.lock().write_all(record)?;
        Ok(())
    }
}

impl LogManager for FileLogManager {
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before: &PageImage,
        after: &PageImage,
    ) -> Result<()> {
        let record = encode(
            KIND_UPDATE,
            tid,
            &[
                &page_id.table.0.to_le_bytes(),
                &page_id.page_no.to_le_bytes(),
                before.as_slice(),
                after.as_slice(),
            ],
        );
        self.append(&record)?;
        trace!(%tid, page = %page_id, "logged update");
        Ok(())
    }

    fn force(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }

    fn log_commit(&self, tid: TransactionId) -> Result<()> {
        self.append(&encode(KIND_COMMIT, tid, &[]))
    }

    fn log_abort(&self, tid: TransactionId) -> Result<()> {
        self.append(&encode(KIND_ABORT, tid, &[]))
    }
}
