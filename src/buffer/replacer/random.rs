//! Random replacement policy.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::common::PageId;

use super::Replacer;

/// Evicts a uniformly random eligible page.
pub struct RandomReplacer {
    pages: Vec<PageId>,
    /// Position of each page in `pages`.
    index: HashMap<PageId, usize>,
    rng: StdRng,
}

impl RandomReplacer {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic victim selection, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            pages: Vec::new(),
            index: HashMap::new(),
            rng,
        }
    }

    fn swap_remove(&mut self, page_id: PageId) {
        let Some(pos) = self.index.remove(&page_id) else {
            return;
        };
        self.pages.swap_remove(pos);
        if let Some(&moved) = self.pages.get(pos) {
            self.index.insert(moved, pos);
        }
    }
}

impl Default for RandomReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replacer for RandomReplacer {
    fn record_access(&mut self, page_id: PageId) {
        if !self.index.contains_key(&page_id) {
            self.index.insert(page_id, self.pages.len());
            self.pages.push(page_id);
        }
    }

    fn remove(&mut self, page_id: PageId) {
        self.swap_remove(page_id);
    }

    fn evict(&mut self, eligible: &mut dyn FnMut(PageId) -> bool) -> Option<PageId> {
        let candidates: Vec<PageId> = self.pages.iter().copied().filter(|&p| eligible(p)).collect();
        let victim = *candidates.choose(&mut self.rng)?;
        self.swap_remove(victim);
        Some(victim)
    }

    fn size(&self) -> usize {
        self.pages.len()
    }
}
