//! Page types.
//!
//! This module contains:
//! - [`PageImage`] - The raw 4KB data container
//! - [`Page`] - A cached page with its dirtier and before-image
//! - [`PageRef`] - The shared handle callers receive from the buffer pool

mod image;
#[allow(clippy::module_inception)]
mod page;

pub use image::PageImage;
pub use page::{Page, PageRef};
