//! PageImage - the raw 4KB content of a page.

use std::fmt;

use crate::common::config::PAGE_SIZE;

/// The bytes of one page (4KB, 4KB-aligned).
///
/// This is the unit of I/O between page stores, the log and memory.
///
/// # Memory Layout
/// - Size: 4096 bytes (4KB)
/// - Alignment: 4096 bytes (for efficient Direct I/O with O_DIRECT)
///
/// # Copying
/// `PageImage` does NOT implement `Clone`: copying 4KB is expensive and
/// must be explicit, so call [`PageImage::snapshot`] when a copy is meant
/// (before-images, log records).
///
/// # Example
/// ```
/// use pagelockdb::storage::PageImage;
///
/// let mut image = PageImage::new();
/// image.as_mut_slice()[0] = 0xFF;
/// assert_eq!(image.as_slice()[0], 0xFF);
/// ```
#[repr(align(4096))]
#[derive(PartialEq, Eq)]
pub struct PageImage {
    data: [u8; PAGE_SIZE],
}

impl PageImage {
    /// Create a new zeroed image.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Build an image from exactly `PAGE_SIZE` bytes.
    ///
    /// # Panics
    /// Panics if `bytes.len() != PAGE_SIZE`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut image = Self::new();
        image.data.copy_from_slice(bytes);
        image
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Overwrite this image with another.
    #[inline]
    pub fn copy_from(&mut self, other: &PageImage) {
        self.data.copy_from_slice(&other.data);
    }

    /// Explicit deep copy.
    pub fn snapshot(&self) -> PageImage {
        PageImage::from_bytes(&self.data)
    }
}

impl Default for PageImage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        f.debug_struct("PageImage").field("used_bytes", &used).finish()
    }
}
