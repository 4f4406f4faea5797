//! Common state of constraints and variables.

use std::cell::OnceCell;

/// Identifier of a subproblem in the enumeration tree.
pub type SubId = u64;

/// Fixing/setting status of a variable.
///
/// *Fixed* is permanent for the remainder of the search, *set* holds only
/// within the subtree that performed the setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsVarStat {
    /// Neither fixed nor set.
    #[default]
    Free,

    /// Set to the lower bound within a subtree.
    SetToLower,

    /// Set to the upper bound within a subtree.
    SetToUpper,

    /// Fixed to the lower bound for the rest of the search.
    FixedToLower,

    /// Fixed to the upper bound for the rest of the search.
    FixedToUpper,
}

impl FsVarStat {
    /// True for the two fixed states.
    pub fn is_fixed(self) -> bool {
        matches!(self, FsVarStat::FixedToLower | FsVarStat::FixedToUpper)
    }

    /// True for the two set states.
    pub fn is_set(self) -> bool {
        matches!(self, FsVarStat::SetToLower | FsVarStat::SetToUpper)
    }

    /// True if the variable is pinned to one of its bounds.
    pub fn pinned(self) -> bool {
        self != FsVarStat::Free
    }

    /// True if `self` and `other` pin the variable to different bounds.
    pub fn contradicts(self, other: FsVarStat) -> bool {
        let low = |s: FsVarStat| matches!(s, FsVarStat::SetToLower | FsVarStat::FixedToLower);
        let up = |s: FsVarStat| matches!(s, FsVarStat::SetToUpper | FsVarStat::FixedToUpper);
        (low(self) && up(other)) || (up(self) && low(other))
    }
}

/// State shared by every constraint and variable.
#[derive(Debug, Clone, Default)]
pub struct ConVarData {
    dynamic: bool,
    local: bool,
    owner: Option<SubId>,
    class: OnceCell<Option<u64>>,
}

impl ConVarData {
    /// State for a globally valid item.
    pub fn global(dynamic: bool) -> Self {
        Self {
            dynamic,
            local: false,
            owner: None,
            class: OnceCell::new(),
        }
    }

    /// State for an item valid only in the subtree rooted at `owner`.
    pub fn local(owner: SubId, dynamic: bool) -> Self {
        Self {
            dynamic,
            local: true,
            owner: Some(owner),
            class: OnceCell::new(),
        }
    }

    /// General constructor. A local item without an owning subproblem is a
    /// construction error and aborts.
    pub fn new(local: bool, owner: Option<SubId>, dynamic: bool) -> Self {
        assert!(
            !local || owner.is_some(),
            "local constraint/variable constructed without an owning subproblem"
        );
        Self {
            dynamic,
            local,
            owner,
            class: OnceCell::new(),
        }
    }

    /// A dynamic item may be dropped from an active set and reclaimed from
    /// its pool once unreferenced.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// True if validity is restricted to the owner's subtree.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Owning subproblem of a local item.
    pub fn owner(&self) -> Option<SubId> {
        self.owner
    }

    /// Validity against a subproblem given by its root-to-node path: a
    /// global item is valid everywhere, a local one exactly in the subtree
    /// of its owner.
    pub fn is_valid_for(&self, path: &[SubId]) -> bool {
        if !self.local {
            return true;
        }
        // Owner presence is enforced at construction.
        let owner = self.owner.expect("local item without owner");
        path.contains(&owner)
    }

    pub(crate) fn class_cache(&self) -> &OnceCell<Option<u64>> {
        &self.class
    }
}

/// Behavior common to constraints and variables.
pub trait ConVar {
    /// Shared state.
    fn data(&self) -> &ConVarData;

    /// Compute the classification key used for pool deduplication.
    /// `None` means the item is never considered a duplicate.
    fn classify(&self) -> Option<u64> {
        None
    }

    /// Classification key, computed lazily on first access and cached.
    fn class_key(&self) -> Option<u64> {
        *self.data().class_cache().get_or_init(|| self.classify())
    }
}
