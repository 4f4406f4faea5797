//! Priority queue of open subproblems.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::sub::Sub;
use crate::lp::OptSense;
use crate::settings::EnumerationStrategy;

struct Ranked {
    priority: f64,
    seq: u64,
    sub: Sub,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority wins; ties go to the earlier subproblem.
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The set of open subproblems, ordered by the enumeration strategy.
pub struct OpenSubs {
    heap: BinaryHeap<Ranked>,
    strategy: EnumerationStrategy,
    sense: OptSense,
    next_seq: u64,
}

impl OpenSubs {
    pub fn new(strategy: EnumerationStrategy, sense: OptSense) -> Self {
        Self {
            heap: BinaryHeap::new(),
            strategy,
            sense,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn rank(&self, sub: &Sub) -> f64 {
        match self.strategy {
            EnumerationStrategy::BestBound => match self.sense {
                OptSense::Maximize => sub.dual_bound(),
                OptSense::Minimize => -sub.dual_bound(),
            },
            EnumerationStrategy::DepthFirst => sub.depth() as f64,
        }
    }

    pub fn push(&mut self, sub: Sub) {
        let priority = self.rank(&sub);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Ranked { priority, seq, sub });
    }

    pub fn pop(&mut self) -> Option<Sub> {
        self.heap.pop().map(|r| r.sub)
    }

    /// Tightest dual bound over all open subproblems.
    pub fn best_dual_bound(&self) -> Option<f64> {
        let pick = |a: f64, b: f64| match self.sense {
            OptSense::Maximize => a.max(b),
            OptSense::Minimize => a.min(b),
        };
        self.heap
            .iter()
            .map(|r| r.sub.dual_bound())
            .reduce(pick)
    }

    /// Drop every open subproblem whose dual bound cannot beat `primal`.
    /// Returns the subproblems removed, so their pool references can be
    /// released.
    pub fn prune(&mut self, primal: f64, eps: f64) -> Vec<Sub> {
        let sense = self.sense;
        let mut kept = BinaryHeap::with_capacity(self.heap.len());
        let mut dropped = Vec::new();
        for r in self.heap.drain() {
            if sense.cannot_improve(r.sub.dual_bound(), primal, eps) {
                dropped.push(r.sub);
            } else {
                kept.push(r);
            }
        }
        self.heap = kept;
        dropped
    }

    /// Drain the queue (run aborted or finished).
    pub fn drain(&mut self) -> Vec<Sub> {
        self.heap.drain().map(|r| r.sub).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::sub::Sub;

    fn sub(id: u64, depth: u32, bound: f64) -> Sub {
        Sub::detached(id, depth, bound)
    }

    #[test]
    fn test_best_bound_order_max() {
        let mut open = OpenSubs::new(EnumerationStrategy::BestBound, OptSense::Maximize);
        open.push(sub(1, 0, 10.0));
        open.push(sub(2, 1, 30.0));
        open.push(sub(3, 1, 20.0));

        assert_eq!(open.best_dual_bound(), Some(30.0));
        assert_eq!(open.pop().unwrap().id(), 2);
        assert_eq!(open.pop().unwrap().id(), 3);
        assert_eq!(open.pop().unwrap().id(), 1);
        assert!(open.pop().is_none());
    }

    #[test]
    fn test_best_bound_order_min() {
        let mut open = OpenSubs::new(EnumerationStrategy::BestBound, OptSense::Minimize);
        open.push(sub(1, 0, 10.0));
        open.push(sub(2, 1, 30.0));

        assert_eq!(open.best_dual_bound(), Some(10.0));
        assert_eq!(open.pop().unwrap().id(), 1);
    }

    #[test]
    fn test_depth_first_breaks_ties_by_age() {
        let mut open = OpenSubs::new(EnumerationStrategy::DepthFirst, OptSense::Maximize);
        open.push(sub(1, 2, 0.0));
        open.push(sub(2, 3, 0.0));
        open.push(sub(3, 3, 0.0));

        // Deepest first; equal depth goes to the earlier push.
        assert_eq!(open.pop().unwrap().id(), 2);
        assert_eq!(open.pop().unwrap().id(), 3);
        assert_eq!(open.pop().unwrap().id(), 1);
    }

    #[test]
    fn test_prune_by_bound() {
        let mut open = OpenSubs::new(EnumerationStrategy::BestBound, OptSense::Maximize);
        open.push(sub(1, 0, 10.0));
        open.push(sub(2, 0, 5.0));
        open.push(sub(3, 0, 8.0));

        // Incumbent of 8: only the bound-10 subproblem can still improve.
        let dropped = open.prune(8.0, 1e-7);
        assert_eq!(dropped.len(), 2);
        assert_eq!(open.len(), 1);
        assert_eq!(open.pop().unwrap().id(), 1);
    }
}
