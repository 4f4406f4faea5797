//! Active sets: ordered views of pool items held by a subproblem.

use std::collections::HashSet;
use std::rc::Rc;

use super::{Pool, PoolRef};
use crate::convar::ConVar;

/// Ordered, non-owning set of pool items.
///
/// Position in the set is the item's row or column index in the
/// subproblem's LP. Every member holds one reference on its pool slot.
pub struct Active<T: ?Sized + ConVar> {
    handles: Vec<PoolRef>,
    items: Vec<Rc<T>>,
    slots: HashSet<usize>,
}

impl<T: ?Sized + ConVar> Active<T> {
    /// Create an empty active set.
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            items: Vec::new(),
            slots: HashSet::new(),
        }
    }

    /// Number of active items.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Items in LP index order.
    pub fn items(&self) -> &[Rc<T>] {
        &self.items
    }

    /// Handles in LP index order.
    pub fn handles(&self) -> &[PoolRef] {
        &self.handles
    }

    /// Item at LP index `i`.
    pub fn item(&self, i: usize) -> &Rc<T> {
        &self.items[i]
    }

    /// Pool slots of the members, for exclusion during separation scans.
    pub fn slots(&self) -> &HashSet<usize> {
        &self.slots
    }

    /// True if the pool item is already a member.
    pub fn contains(&self, r: PoolRef) -> bool {
        self.slots.contains(&r.slot)
    }

    /// Append a pool item; its LP index is the position returned.
    /// Re-inserting a member returns its existing index.
    pub fn insert(&mut self, pool: &mut Pool<T>, r: PoolRef) -> usize {
        if self.contains(r) {
            let i = self
                .handles
                .iter()
                .position(|h| h.slot == r.slot)
                .expect("slot set out of sync with handles");
            return i;
        }
        let item = pool
            .get(r)
            .expect("inserting a stale handle into an active set")
            .clone();
        pool.add_ref(r);
        self.handles.push(r);
        self.items.push(item);
        self.slots.insert(r.slot);
        self.handles.len() - 1
    }

    /// Remove the members at the given LP indices, preserving the relative
    /// order of the rest. Only dynamic items may be removed.
    pub fn remove(&mut self, pool: &mut Pool<T>, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let drop: HashSet<usize> = indices.iter().copied().collect();
        debug_assert!(drop.iter().all(|&i| i < self.handles.len()));

        let mut kept_handles = Vec::with_capacity(self.handles.len() - drop.len());
        let mut kept_items = Vec::with_capacity(self.items.len() - drop.len());
        for (i, (h, item)) in self.handles.iter().zip(self.items.drain(..)).enumerate() {
            if drop.contains(&i) {
                debug_assert!(
                    item.data().is_dynamic(),
                    "removing a non-dynamic item from an active set"
                );
                self.slots.remove(&h.slot);
                pool.release(*h);
            } else {
                kept_handles.push(*h);
                kept_items.push(item);
            }
        }
        self.handles = kept_handles;
        self.items = kept_items;
    }

    /// Drop all references, emptying the set.
    pub fn release_all(&mut self, pool: &mut Pool<T>) {
        for &h in &self.handles {
            pool.release(h);
        }
        self.handles.clear();
        self.items.clear();
        self.slots.clear();
    }

    /// Duplicate the set for a child subproblem, taking fresh references.
    pub fn duplicate(&self, pool: &mut Pool<T>) -> Self {
        for &h in &self.handles {
            pool.add_ref(h);
        }
        Self {
            handles: self.handles.clone(),
            items: self.items.clone(),
            slots: self.slots.clone(),
        }
    }
}

impl<T: ?Sized + ConVar> Default for Active<T> {
    fn default() -> Self {
        Self::new()
    }
}
