//! pagelockdb - A transactional page cache with an integrated lock manager.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Transactions (callers)                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Buffer Pool (buffer/)                     │   │
//! │  │   get_page · insert/delete/update · transaction_complete │   │
//! │  │   ┌─────────────────────────────────────────────────┐   │   │
//! │  │   │  Victim selection: Random | FIFO | LRU          │   │   │
//! │  │   │  Eviction: NoSteal (FORCE) | Steal (NO-FORCE)   │   │   │
//! │  │   └─────────────────────────────────────────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │          ↓                    ↓                    ↓            │
//! │  ┌───────────────┐  ┌──────────────────┐  ┌────────────────┐   │
//! │  │ concurrency/  │  │    recovery/     │  │    storage/    │   │
//! │  │ LockManager   │  │ LogManager (WAL) │  │ Catalog        │   │
//! │  │ WaitForGraph  │  │ recover()        │  │ PageStore      │   │
//! │  └───────────────┘  └──────────────────┘  │ HeapFile       │   │
//! │                                           └────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, TransactionId, Error, config)
//! - [`buffer`] - The buffer pool and replacement policies
//! - [`concurrency`] - Page locks and deadlock detection
//! - [`recovery`] - Write-ahead logging and crash recovery
//! - [`storage`] - Page stores, the catalog and page formats
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use pagelockdb::common::config::BufferPoolConfig;
//! use pagelockdb::recovery::FileLogManager;
//! use pagelockdb::storage::{HeapFile, TableRegistry};
//! use pagelockdb::{BufferPool, TableId, TransactionId};
//!
//! let registry = Arc::new(TableRegistry::new());
//! registry.register(Arc::new(HeapFile::open_or_create("users.tbl", TableId::new(1), 32)?));
//! let log = Arc::new(FileLogManager::open("wal.log")?);
//!
//! let pool = BufferPool::new(BufferPoolConfig::default(), registry, log);
//! let tid = TransactionId::new();
//! pool.insert_tuple(tid, TableId::new(1), &[0u8; 32])?;
//! pool.transaction_complete(tid, true)?;
//! # Ok::<(), pagelockdb::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, PageId, RecordId, Result, TableId, TransactionId};

pub use buffer::{BufferPool, BufferPoolStats, StatsSnapshot};
pub use concurrency::{LockManager, Permissions};
pub use storage::page::{Page, PageImage, PageRef};
