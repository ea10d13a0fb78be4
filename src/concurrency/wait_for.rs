//! Wait-for graph used for deadlock detection.

use std::collections::{HashMap, HashSet};

use crate::common::TransactionId;

/// Directed graph of blocked transactions.
///
/// An edge `a -> b` means `a` is waiting for a lock that `b` holds. A
/// transaction only has outgoing edges while one of its lock requests is
/// pending.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `waiter`'s outgoing edges with `holders`.
    pub fn set_waits<I>(&mut self, waiter: TransactionId, holders: I)
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let targets: HashSet<TransactionId> =
            holders.into_iter().filter(|&h| h != waiter).collect();
        if targets.is_empty() {
            self.edges.remove(&waiter);
        } else {
            self.edges.insert(waiter, targets);
        }
    }

    /// Drop all of `waiter`'s outgoing edges.
    pub fn clear(&mut self, waiter: TransactionId) {
        self.edges.remove(&waiter);
    }

    /// Transactions `waiter` is currently blocked behind.
    pub fn waits_for(&self, waiter: TransactionId) -> Option<&HashSet<TransactionId>> {
        self.edges.get(&waiter)
    }

    /// Number of transactions with a pending request.
    pub fn waiting(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if a cycle is reachable from `start`.
    ///
    /// Iterative depth-first search. A node is "on path" while it is on the
    /// DFS stack; reaching an on-path node again closes a cycle. Nodes whose
    /// subtrees have been fully explored are never revisited.
    pub fn has_cycle_from(&self, start: TransactionId) -> bool {
        let successors = |t: TransactionId| self.edges.get(&t).into_iter().flatten().copied();

        let mut on_path: HashSet<TransactionId> = HashSet::new();
        let mut finished: HashSet<TransactionId> = HashSet::new();
        let mut stack = vec![(start, successors(start))];
        on_path.insert(start);

        loop {
            let Some((node, next)) = stack.last_mut() else {
                return false;
            };
            let node = *node;

            match next.next() {
                Some(succ) if on_path.contains(&succ) => return true,
                Some(succ) if finished.contains(&succ) => {}
                Some(succ) => {
                    on_path.insert(succ);
                    stack.push((succ, successors(succ)));
                }
                None => {
                    on_path.remove(&node);
                    finished.insert(node);
                    stack.pop();
                }
            }
        }
    }
}
