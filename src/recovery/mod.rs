//! Write-ahead logging and crash recovery.
//!
//! - [`LogManager`] - The log contract the buffer pool writes through
//! - [`FileLogManager`] - CRC-framed append-only log file
//! - [`recover`] - Undo losers, redo winners

mod log_manager;
#[allow(clippy::module_inception)]
mod recovery;

pub use log_manager::{FileLogManager, LogManager, LogRecord, NullLogManager};
pub use recovery::{recover, RecoveryReport};
