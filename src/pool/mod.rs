//! Pools: shared repositories of constraints and variables.
//!
//! A [`Pool`] exclusively owns its items; subproblems reference them
//! through [`Active`](crate::pool::Active) sets holding lightweight
//! `(slot, version)` handles. An item is reclaimed once its reference
//! count drops to zero, provided it is dynamic.

mod active;

pub use active::Active;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::convar::{ConVar, SubId};

/// Handle to one pool slot. Stale handles (the slot was reused) are
/// detectable through the version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolRef {
    pub(crate) slot: usize,
    pub(crate) version: u64,
}

impl PoolRef {
    /// Slot index inside the pool.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

struct Slot<T: ?Sized> {
    item: Option<Rc<T>>,
    version: u64,
    refs: usize,
    generation: u64,
}

impl<T: ?Sized> Slot<T> {
    fn empty() -> Self {
        Self {
            item: None,
            version: 0,
            refs: 0,
            generation: 0,
        }
    }
}

/// Pool statistics.
#[derive(Debug, Default, Clone)]
pub struct PoolStats {
    /// Total items inserted.
    pub total_inserted: u64,

    /// Insertions rejected as duplicates by classification key.
    pub duplicates: u64,

    /// Total items removed or reclaimed.
    pub total_removed: u64,

    /// Peak number of live items.
    pub peak_len: usize,
}

/// Growable arena of constraints or variables.
pub struct Pool<T: ?Sized + ConVar> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    keys: HashMap<u64, usize>,
    len: usize,
    next_generation: u64,
    realloc_fac: f64,
    stats: PoolStats,
}

impl<T: ?Sized + ConVar> Pool<T> {
    /// Create a pool with an initial slot capacity and growth fraction.
    pub fn with_capacity(cap: usize, realloc_fac: f64) -> Self {
        debug_assert!(realloc_fac > 0.0);
        let cap = cap.max(1);
        let mut pool = Self {
            slots: Vec::new(),
            free: Vec::new(),
            keys: HashMap::new(),
            len: 0,
            next_generation: 0,
            realloc_fac,
            stats: PoolStats::default(),
        };
        pool.grow(cap);
        pool
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no items are live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current slot capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Pool statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Grow to an explicitly requested slot capacity.
    pub fn grow(&mut self, new_cap: usize) {
        for i in self.slots.len()..new_cap {
            self.slots.push(Slot::empty());
            self.free.push(i);
        }
    }

    fn grown_size(&self) -> usize {
        let cap = self.slots.len();
        let grown = (cap as f64 * (1.0 + self.realloc_fac)).ceil() as usize;
        grown.max(cap + 1)
    }

    /// Insert an item.
    ///
    /// Returns the handle and whether the item was a duplicate by
    /// classification key; for duplicates the handle of the already
    /// stored item is returned and the new one is dropped.
    pub fn insert(&mut self, item: Rc<T>) -> (PoolRef, bool) {
        if let Some(key) = item.class_key() {
            if let Some(&slot) = self.keys.get(&key) {
                self.stats.duplicates += 1;
                let s = &self.slots[slot];
                debug_assert!(s.item.is_some());
                return (
                    PoolRef {
                        slot,
                        version: s.version,
                    },
                    true,
                );
            }
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.grow(self.grown_size());
                self.free.pop().expect("pool growth produced no free slot")
            }
        };

        let s = &mut self.slots[slot];
        s.version += 1;
        s.refs = 0;
        s.generation = self.next_generation;
        self.next_generation += 1;

        if let Some(key) = item.class_key() {
            self.keys.insert(key, slot);
        }
        s.item = Some(item);

        self.len += 1;
        self.stats.total_inserted += 1;
        self.stats.peak_len = self.stats.peak_len.max(self.len);

        (
            PoolRef {
                slot,
                version: self.slots[slot].version,
            },
            false,
        )
    }

    /// Look up an item; `None` for stale or empty handles.
    pub fn get(&self, r: PoolRef) -> Option<&Rc<T>> {
        let s = self.slots.get(r.slot)?;
        if s.version != r.version {
            return None;
        }
        s.item.as_ref()
    }

    /// Insertion generation of a live item.
    pub fn generation(&self, r: PoolRef) -> Option<u64> {
        let s = self.slots.get(r.slot)?;
        (s.version == r.version && s.item.is_some()).then_some(s.generation)
    }

    /// Increment the reference count (an active set now points here).
    pub fn add_ref(&mut self, r: PoolRef) {
        debug_assert!(r.slot < self.slots.len());
        let s = &mut self.slots[r.slot];
        debug_assert_eq!(s.version, r.version, "stale pool handle");
        debug_assert!(s.item.is_some());
        s.refs += 1;
    }

    /// Decrement the reference count; a dynamic item is reclaimed at zero.
    pub fn release(&mut self, r: PoolRef) {
        debug_assert!(r.slot < self.slots.len());
        let reclaim = {
            let s = &mut self.slots[r.slot];
            debug_assert_eq!(s.version, r.version, "stale pool handle");
            debug_assert!(s.refs > 0, "release without matching add_ref");
            s.refs -= 1;
            s.refs == 0
                && s.item
                    .as_ref()
                    .map(|i| i.data().is_dynamic())
                    .unwrap_or(false)
        };
        if reclaim {
            self.remove(r);
        }
    }

    /// Remove an item, invalidating only its slot; the iteration order of
    /// the remaining members is unaffected.
    pub fn remove(&mut self, r: PoolRef) {
        let Some(s) = self.slots.get_mut(r.slot) else {
            return;
        };
        if s.version != r.version || s.item.is_none() {
            return;
        }
        debug_assert_eq!(s.refs, 0, "removing a referenced pool item");

        if let Some(key) = s.item.as_ref().and_then(|i| i.class_key()) {
            self.keys.remove(&key);
        }
        s.item = None;
        s.refs = 0;
        self.free.push(r.slot);
        self.len -= 1;
        self.stats.total_removed += 1;
    }

    /// Iterate over live items in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolRef, &Rc<T>)> {
        self.slots.iter().enumerate().filter_map(|(slot, s)| {
            s.item.as_ref().map(|item| {
                (
                    PoolRef {
                        slot,
                        version: s.version,
                    },
                    item,
                )
            })
        })
    }

    /// Separation scan: collect live items that are valid for the
    /// subproblem described by `path`, not in `exclude`, and violated
    /// according to `violation` (which returns `Some(amount)` for violated
    /// items). The result is ordered most-violated-first, ties broken by
    /// insertion generation, and truncated to `max_hits`.
    pub fn scan_violated<F>(
        &self,
        path: &[SubId],
        exclude: &HashSet<usize>,
        max_hits: usize,
        violation: F,
    ) -> Vec<(PoolRef, f64)>
    where
        F: Fn(&T) -> Option<f64>,
    {
        let mut hits: Vec<(PoolRef, f64, u64)> = Vec::new();
        for (slot, s) in self.slots.iter().enumerate() {
            let Some(item) = s.item.as_ref() else {
                continue;
            };
            if exclude.contains(&slot) || !item.data().is_valid_for(path) {
                continue;
            }
            if let Some(v) = violation(item.as_ref()) {
                hits.push((
                    PoolRef {
                        slot,
                        version: s.version,
                    },
                    v,
                    s.generation,
                ));
            }
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        hits.truncate(max_hits);
        hits.into_iter().map(|(r, v, _)| (r, v)).collect()
    }
}
