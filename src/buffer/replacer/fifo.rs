//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};

use crate::common::PageId;

use super::Replacer;

/// Evicts pages in the order they became resident.
///
/// Re-accessing a resident page does not move it.
pub struct FifoReplacer {
    /// Page IDs in arrival order (front = oldest).
    queue: VecDeque<PageId>,

    /// Set for O(1) membership check.
    in_queue: HashSet<PageId>,
}

impl FifoReplacer {
    /// Create a new FIFO replacer.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            in_queue: HashSet::new(),
        }
    }
}

impl Default for FifoReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replacer for FifoReplacer {
    /// Only adds to the queue if not already present.
    fn record_access(&mut self, page_id: PageId) {
        if self.in_queue.insert(page_id) {
            self.queue.push_back(page_id);
        }
    }

    fn remove(&mut self, page_id: PageId) {
        if self.in_queue.remove(&page_id) {
            self.queue.retain(|&p| p != page_id);
        }
    }

    /// Returns the oldest eligible page.
    fn evict(&mut self, eligible: &mut dyn FnMut(PageId) -> bool) -> Option<PageId> {
        let pos = self.queue.iter().position(|&p| eligible(p))?;
        let page_id = self.queue.remove(pos)?;
        self.in_queue.remove(&page_id);
        Some(page_id)
    }

    fn size(&self) -> usize {
        self.queue.len()
    }
}
