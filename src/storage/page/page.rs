//! Page - a cached page together with its transactional state.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{PageId, TransactionId};

use super::image::PageImage;

/// Shared handle to a page that lives in the buffer pool.
///
/// The cache owns the page; callers get a handle and go through its lock
/// for every read or write of the content.
pub type PageRef = Arc<RwLock<Page>>;

/// A page plus the state the buffer pool needs to make it transactional:
/// - the transaction that last dirtied it (if any)
/// - a before-image: the content as of the last commit point
/// - the committed transaction, if any, whose changes were not yet
///   written to the store when the current dirtier took over
///
/// Both images are boxed so that moving a `Page` is cheap.
pub struct Page {
    id: PageId,
    data: Box<PageImage>,
    before_image: Box<PageImage>,
    dirtier: Option<TransactionId>,
    unflushed: Option<TransactionId>,
}

impl Page {
    /// Wrap freshly read content. The before-image starts equal to it.
    pub fn new(id: PageId, data: PageImage) -> Self {
        let before_image = Box::new(data.snapshot());
        Self {
            id,
            data: Box::new(data),
            before_image,
            dirtier: None,
            unflushed: None,
        }
    }

    /// A zeroed, clean page.
    pub fn empty(id: PageId) -> Self {
        Self::new(id, PageImage::new())
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Current content.
    #[inline]
    pub fn data(&self) -> &PageImage {
        &self.data
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Mutable access to the content. Callers that change the page must
    /// hold an exclusive lock on it.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }

    /// The transaction that dirtied this page, or `None` if it is clean.
    #[inline]
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtier
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self, tid: TransactionId) {
        if let Some(prev) = self.dirtier.filter(|&prev| prev != tid) {
            self.unflushed = Some(prev);
        }
        self.dirtier = Some(tid);
    }

    /// The content now matches the store.
    #[inline]
    pub(crate) fn clear_dirty(&mut self) {
        self.dirtier = None;
        self.unflushed = None;
    }

    /// Content as of the last commit point.
    #[inline]
    pub fn before_image(&self) -> &PageImage {
        &self.before_image
    }

    /// Make the current content the new rollback point.
    pub(crate) fn set_before_image(&mut self) {
        self.before_image.copy_from(&self.data);
    }

    /// Undo everything `tid` did since the last commit point.
    ///
    /// A page whose committed content never reached the store stays dirty
    /// on behalf of the committed transaction.
    pub(crate) fn rollback(&mut self, tid: TransactionId) {
        self.data.copy_from(&self.before_image);
        if self.dirtier == Some(tid) {
            self.dirtier = self.unflushed.take();
        }
    }

    /// Reset both content and rollback point to `image`.
    pub(crate) fn restore_from(&mut self, image: &PageImage) {
        self.data.copy_from(image);
        self.before_image.copy_from(image);
        self.dirtier = None;
        self.unflushed = None;
    }

    /// Move this page into a shareable handle.
    pub fn into_ref(self) -> PageRef {
        Arc::new(RwLock::new(self))
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("dirtier", &self.dirtier)
            .field("unflushed", &self.unflushed)
            .finish()
    }
}
