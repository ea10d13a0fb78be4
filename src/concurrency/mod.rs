//! Concurrency control.
//!
//! Strict two-phase locking at page granularity:
//! - [`LockManager`] - Lock table, blocking acquisition, deadlock detection
//! - [`WaitForGraph`] - Who is blocked behind whom
//! - [`Permissions`] - Shared or exclusive

mod lock_manager;
mod wait_for;

pub use lock_manager::{LockManager, LockStats, LockStatsSnapshot, Permissions};
pub use wait_for::WaitForGraph;
