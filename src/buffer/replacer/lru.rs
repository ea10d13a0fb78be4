//! LRU (Least Recently Used) replacement policy.

use std::collections::HashMap;

use crate::common::PageId;

use super::Replacer;

/// Evicts the eligible page whose last access is oldest.
///
/// Each access stamps the page with a monotonically increasing tick.
/// Eviction sorts candidates by tick: O(n log n) in resident pages.
#[derive(Debug, Default)]
pub struct LruReplacer {
    clock: u64,
    last_access: HashMap<PageId, u64>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Replacer for LruReplacer {
    fn record_access(&mut self, page_id: PageId) {
        self.clock += 1;
        self.last_access.insert(page_id, self.clock);
    }

    fn remove(&mut self, page_id: PageId) {
        self.last_access.remove(&page_id);
    }

    fn evict(&mut self, eligible: &mut dyn FnMut(PageId) -> bool) -> Option<PageId> {
        let mut candidates: Vec<(u64, PageId)> = self
            .last_access
            .iter()
            .map(|(&pid, &tick)| (tick, pid))
            .collect();
        candidates.sort_unstable();

        let (_, victim) = candidates.into_iter().find(|&(_, pid)| eligible(pid))?;
        self.last_access.remove(&victim);
        Some(victim)
    }

    fn size(&self) -> usize {
        self.last_access.len()
    }
}
