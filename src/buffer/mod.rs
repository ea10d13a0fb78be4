//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between transactions and the
//! page stores. Every page a transaction touches goes through it, so it
//! is also where page locks are taken and where commit and abort settle
//! page content.
//!
//! # Components
//! - [`BufferPool`] - The transactional page cache
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Victim selection policies

mod buffer_pool;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use stats::{BufferPoolStats, StatsSnapshot};
