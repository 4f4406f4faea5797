//! The problem seam: applications implement [`Problem`] and the engine
//! drives separation, pricing, branching and bounding through it.

use std::rc::Rc;

use crate::convar::{Constraint, FsVarStat, VarType, Variable};
use crate::lp::OptSense;
use crate::pool::PoolRef;
use crate::settings::Settings;

/// Read-only view of the subproblem state handed to every hook.
pub struct SubCtx<'a> {
    /// Primal point of the last LP solve, indexed like `vars`.
    pub x: &'a [f64],

    /// Dual values of the last LP solve, indexed like `cons`.
    pub y: &'a [f64],

    /// Active variables in LP column order.
    pub vars: &'a [Rc<dyn Variable>],

    /// Active constraints in LP row order.
    pub cons: &'a [Rc<dyn Constraint>],

    /// Pool handles of the active variables, for branching rules.
    pub var_refs: &'a [PoolRef],

    /// Dual bound of the subproblem.
    pub dual_bound: f64,

    /// Depth in the enumeration tree (0 at the root).
    pub depth: u32,

    /// Objective sense.
    pub sense: OptSense,

    /// Engine parameters.
    pub settings: &'a Settings,
}

/// Buffer for constraints found during separation. Added constraints are
/// pooled and activated by the engine after the hook returns.
pub struct SeparateCtx<'a, 'b> {
    pub sub: &'b SubCtx<'a>,
    found: Vec<Rc<dyn Constraint>>,
}

impl<'a, 'b> SeparateCtx<'a, 'b> {
    pub(crate) fn new(sub: &'b SubCtx<'a>) -> Self {
        Self {
            sub,
            found: Vec::new(),
        }
    }

    /// Hand a violated constraint to the engine.
    pub fn add(&mut self, con: Rc<dyn Constraint>) {
        self.found.push(con);
    }

    pub fn found(&self) -> usize {
        self.found.len()
    }

    pub(crate) fn take(self) -> Vec<Rc<dyn Constraint>> {
        self.found
    }
}

/// Buffer for variables found during pricing.
pub struct PricingCtx<'a, 'b> {
    pub sub: &'b SubCtx<'a>,
    found: Vec<Rc<dyn Variable>>,
}

impl<'a, 'b> PricingCtx<'a, 'b> {
    pub(crate) fn new(sub: &'b SubCtx<'a>) -> Self {
        Self {
            sub,
            found: Vec::new(),
        }
    }

    /// Hand a variable with profitable reduced cost to the engine.
    pub fn add(&mut self, var: Rc<dyn Variable>) {
        self.found.push(var);
    }

    pub fn found(&self) -> usize {
        self.found.len()
    }

    pub(crate) fn take(self) -> Vec<Rc<dyn Variable>> {
        self.found
    }
}

/// A fractional variable eligible for branching.
#[derive(Debug, Clone, Copy)]
pub struct BranchCandidate {
    /// LP column index of the variable.
    pub index: usize,

    /// Its value in the LP point.
    pub value: f64,

    /// Distance to the nearest integer, in [0, 0.5].
    pub violation: f64,
}

/// One branching rule, applied on entry to a son subproblem.
#[derive(Debug, Clone)]
pub enum BranchRule {
    /// Pin a variable to one of its bounds within the son's subtree.
    Set { var: PoolRef, stat: FsVarStat },

    /// Change one or both bounds of a variable within the son's subtree.
    Bound {
        var: PoolRef,
        lb: Option<f64>,
        ub: Option<f64>,
    },
}

/// An application of the engine.
///
/// The two mandatory items are the sense and the initial variables;
/// every other hook has a workable default. Separation and pricing
/// defaults find nothing, so a plain implementation degenerates to
/// branch-and-bound over the initial formulation.
pub trait Problem {
    /// Optimization sense.
    fn objective_sense(&self) -> OptSense;

    /// Variables of the root relaxation.
    fn initial_variables(&self) -> Vec<Rc<dyn Variable>>;

    /// Constraints of the root relaxation.
    fn initial_constraints(&self) -> Vec<Rc<dyn Constraint>> {
        Vec::new()
    }

    /// Whether the LP point is a feasible solution of the integer
    /// program. The default accepts any point where every integral
    /// variable takes an integral value; override when feasibility
    /// requires constraints outside the active set.
    fn feasible(&self, ctx: &SubCtx<'_>) -> bool {
        ctx.vars.iter().zip(ctx.x).all(|(v, &x)| {
            !v.is_integral() || (x - x.round()).abs() <= ctx.settings.int_feas_tol
        })
    }

    /// Find constraints violated by the LP point and add them to `ctx`.
    /// Returns the number found.
    fn separate(&self, _ctx: &mut SeparateCtx<'_, '_>) -> usize {
        0
    }

    /// Find inactive variables with profitable reduced cost and add them
    /// to `ctx`. Returns the number found. Called only when pricing is
    /// enabled in the settings.
    fn pricing(&self, _ctx: &mut PricingCtx<'_, '_>) -> usize {
        0
    }

    /// Branching candidates at the LP point. The default proposes every
    /// fractional integral variable that is not pinned.
    fn select_branching_candidates(&self, ctx: &SubCtx<'_>) -> Vec<BranchCandidate> {
        let tol = ctx.settings.int_feas_tol;
        ctx.vars
            .iter()
            .zip(ctx.x)
            .enumerate()
            .filter(|(_, (v, &x))| {
                v.is_integral()
                    && !v.global_stat().pinned()
                    && (x - x.round()).abs() > tol
            })
            .map(|(index, (_, &value))| BranchCandidate {
                index,
                value,
                violation: (value - value.round()).abs(),
            })
            .collect()
    }

    /// Pick the candidate to branch on; returns an index into
    /// `candidates`. The default prefers the most fractional variable
    /// among those beyond the strong-violation threshold, falling back to
    /// the most fractional overall; ties go to the lowest LP index.
    fn select_branching_variable(
        &self,
        ctx: &SubCtx<'_>,
        candidates: &[BranchCandidate],
    ) -> usize {
        debug_assert!(!candidates.is_empty());
        let best = |pass: &dyn Fn(&BranchCandidate) -> bool| {
            let mut pick: Option<usize> = None;
            for (k, c) in candidates.iter().enumerate() {
                if !pass(c) {
                    continue;
                }
                match pick {
                    None => pick = Some(k),
                    Some(p) => {
                        let cur = &candidates[p];
                        if c.violation > cur.violation
                            || (c.violation == cur.violation && c.index < cur.index)
                        {
                            pick = Some(k);
                        }
                    }
                }
            }
            pick
        };

        let strong = ctx.settings.strong_violation;
        best(&|c: &BranchCandidate| c.violation >= strong)
            .or_else(|| best(&|_| true))
            .unwrap_or(0)
    }

    /// Branching rules for the chosen candidate, one per son. The default
    /// sets binary variables to their bounds and splits general integers
    /// at the fractional value.
    fn branch_rules(&self, ctx: &SubCtx<'_>, candidate: &BranchCandidate) -> Vec<BranchRule> {
        let var = ctx.var_refs[candidate.index];
        match ctx.vars[candidate.index].var_type() {
            VarType::Binary => vec![
                BranchRule::Set {
                    var,
                    stat: FsVarStat::SetToLower,
                },
                BranchRule::Set {
                    var,
                    stat: FsVarStat::SetToUpper,
                },
            ],
            _ => {
                let floor = candidate.value.floor();
                vec![
                    BranchRule::Bound {
                        var,
                        lb: None,
                        ub: Some(floor),
                    },
                    BranchRule::Bound {
                        var,
                        lb: Some(floor + 1.0),
                        ub: None,
                    },
                ]
            }
        }
    }

    /// Primal heuristic: derive a feasible point from the LP point.
    /// Returns the point (indexed like `ctx.x`) and its objective value.
    fn improve(&self, _ctx: &SubCtx<'_>) -> Option<(Vec<f64>, f64)> {
        None
    }
}
