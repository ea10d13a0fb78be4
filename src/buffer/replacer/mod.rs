//! Replacement policies (replacers).
//!
//! A replacer only orders resident pages; it does not know whether a page
//! may be evicted. The buffer pool passes an eligibility predicate to
//! [`Replacer::evict`] (under no-steal, dirty pages are ineligible).
//!
//! Implementations:
//! - [`RandomReplacer`] - Uniformly random victim among eligible pages
//! - [`FifoReplacer`] - Oldest resident page first
//! - [`LruReplacer`] - Least recently accessed page first

mod fifo;
mod lru;
mod random;

pub use fifo::FifoReplacer;
pub use lru::LruReplacer;
pub use random::RandomReplacer;

use crate::common::config::ReplacementPolicy;
use crate::common::PageId;

/// Chooses which resident page to evict.
pub trait Replacer: Send {
    /// Record that `page_id` is resident and was just accessed.
    fn record_access(&mut self, page_id: PageId);

    /// Stop tracking `page_id`.
    fn remove(&mut self, page_id: PageId);

    /// Pick a victim among tracked pages for which `eligible` returns true,
    /// and stop tracking it.
    ///
    /// Returns `None` if no tracked page is eligible.
    fn evict(&mut self, eligible: &mut dyn FnMut(PageId) -> bool) -> Option<PageId>;

    /// Number of tracked pages.
    fn size(&self) -> usize;
}

/// Build the replacer for `policy`.
pub fn make_replacer(policy: ReplacementPolicy) -> Box<dyn Replacer> {
    match policy {
        ReplacementPolicy::Random => Box::new(RandomReplacer::new()),
        ReplacementPolicy::Fifo => Box::new(FifoReplacer::new()),
        ReplacementPolicy::Lru => Box::new(LruReplacer::new()),
    }
}
