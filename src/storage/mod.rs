//! Storage layer - page stores, the catalog and page types.
//!
//! This module handles persistent storage:
//! - [`PageStore`] - The contract the buffer pool reads and writes through
//! - [`HeapFile`] - File-backed store with fixed-width tuple slots
//! - [`Catalog`] / [`TableRegistry`] - Table id to store resolution
//! - [`page`] - Page types

mod catalog;
mod heap_file;
pub mod page;
mod page_store;

pub use catalog::{Catalog, TableRegistry};
pub use heap_file::HeapFile;
pub use page::{Page, PageImage, PageRef};
pub use page_store::PageStore;
