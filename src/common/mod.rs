//! Common types and utilities shared across pagelockdb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`BufferPoolConfig`](config::BufferPoolConfig)
//! - Error types
//! - Identifiers (TableId, PageId, RecordId, TransactionId)

pub mod config;
pub mod error;
mod page_id;
mod transaction_id;

pub use error::{Error, Result};
pub use page_id::{PageId, RecordId, TableId};
pub use transaction_id::TransactionId;
