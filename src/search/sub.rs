//! One subproblem of the enumeration tree.
//!
//! A subproblem owns references into the master's pools (its active
//! sets), its local variable statuses and bounds, and the branching rule
//! that distinguishes it from its father. The LP relaxation lives only
//! for the duration of [`Sub::process`].

use std::rc::Rc;

use super::RoundResult;
use crate::convar::{column_of, reduced_cost, Constraint, FsVarStat, SubId, Variable};
use crate::error::{EngineError, EngineResult};
use crate::lp::{LpRelaxation, LpStatus, OptSense, OptimizationMethod};
use crate::master::SearchCtx;
use crate::pool::{Active, Pool, PoolRef};
use crate::problem::{BranchRule, PricingCtx, Problem, SeparateCtx, SubCtx};
use crate::settings::Settings;
use crate::sparse::{Column, SparseVec};

/// Lifecycle state of a subproblem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubStatus {
    /// Created but not yet processed.
    Created,

    /// Solving the LP relaxation.
    LpSolving,

    /// Looking for violated constraints.
    Separating,

    /// Looking for profitable variables.
    Pricing,

    /// Terminal: the LP point solves the integer program on this node.
    IntegerFeasible,

    /// Terminal: sons were generated.
    Branched,

    /// Terminal: the subproblem cannot contain a better solution.
    Fathomed,
}

/// Result of processing a subproblem.
pub enum SubOutcome {
    Fathomed,
    IntegerFeasible,
    Branched(Vec<Sub>),

    /// The wall-clock budget ran out mid-node; the subproblem keeps its
    /// pool references and stays open.
    TimedOut,
}

/// Rounds a dynamic constraint must stay slack and dual-inactive before
/// it is eliminated from the relaxation.
const ELIMINATION_AGE: u32 = 2;

pub struct Sub {
    id: SubId,
    path: Vec<SubId>,
    depth: u32,
    status: SubStatus,
    dual_bound: f64,
    active_cons: Active<dyn Constraint>,
    active_vars: Active<dyn Variable>,
    local_stat: Vec<FsVarStat>,
    lb: Vec<f64>,
    ub: Vec<f64>,
    entry_rule: Option<BranchRule>,
}

impl Sub {
    /// Create the root subproblem over the given pooled items.
    pub(crate) fn root(
        id: SubId,
        con_pool: &mut Pool<dyn Constraint>,
        var_pool: &mut Pool<dyn Variable>,
        con_refs: &[PoolRef],
        var_refs: &[PoolRef],
        dual_bound: f64,
    ) -> Self {
        let mut active_cons = Active::new();
        for &r in con_refs {
            active_cons.insert(con_pool, r);
        }
        let mut active_vars = Active::new();
        for &r in var_refs {
            active_vars.insert(var_pool, r);
        }
        let n = active_vars.len();
        let (lb, ub) = active_vars.items().iter().map(|v| v.fixed_bounds()).unzip();
        Self {
            id,
            path: vec![id],
            depth: 0,
            status: SubStatus::Created,
            dual_bound,
            active_cons,
            active_vars,
            local_stat: vec![FsVarStat::Free; n],
            lb,
            ub,
            entry_rule: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(id: SubId, depth: u32, dual_bound: f64) -> Self {
        Self {
            id,
            path: vec![id],
            depth,
            status: SubStatus::Created,
            dual_bound,
            active_cons: Active::new(),
            active_vars: Active::new(),
            local_stat: Vec::new(),
            lb: Vec::new(),
            ub: Vec::new(),
            entry_rule: None,
        }
    }

    pub fn id(&self) -> SubId {
        self.id
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn dual_bound(&self) -> f64 {
        self.dual_bound
    }

    pub fn status(&self) -> SubStatus {
        self.status
    }

    /// Root-to-node path, used for local validity tests.
    pub fn path(&self) -> &[SubId] {
        &self.path
    }

    /// Drop all pool references held by this subproblem.
    pub(crate) fn release(
        &mut self,
        con_pool: &mut Pool<dyn Constraint>,
        var_pool: &mut Pool<dyn Variable>,
    ) {
        self.active_cons.release_all(con_pool);
        self.active_vars.release_all(var_pool);
    }

    fn make_son(&self, id: SubId, rule: BranchRule, ctx: &mut SearchCtx<'_>) -> Sub {
        let mut path = self.path.clone();
        path.push(id);
        Sub {
            id,
            path,
            depth: self.depth + 1,
            status: SubStatus::Created,
            dual_bound: self.dual_bound,
            active_cons: self.active_cons.duplicate(ctx.con_pool),
            active_vars: self.active_vars.duplicate(ctx.var_pool),
            local_stat: self.local_stat.clone(),
            lb: self.lb.clone(),
            ub: self.ub.clone(),
            entry_rule: Some(rule),
        }
    }

    fn var_index(&self, r: PoolRef) -> EngineResult<usize> {
        self.active_vars
            .handles()
            .iter()
            .position(|h| *h == r)
            .ok_or_else(|| {
                EngineError::Internal(format!(
                    "branching variable of subproblem {} is not active",
                    self.id
                ))
            })
    }

    /// Apply the branching rule inherited from the father. Returns false
    /// if the rule contradicts earlier settings or fixings.
    fn apply_entry_rule(&mut self) -> EngineResult<bool> {
        let Some(rule) = self.entry_rule.take() else {
            return Ok(true);
        };
        match rule {
            BranchRule::Set { var, stat } => {
                let j = self.var_index(var)?;
                let v = self.active_vars.item(j).clone();
                if v.global_stat().contradicts(stat) || self.local_stat[j].contradicts(stat) {
                    return Ok(false);
                }
                self.local_stat[j] = stat;
                let b = match stat {
                    FsVarStat::SetToLower | FsVarStat::FixedToLower => v.lbound(),
                    _ => v.ubound(),
                };
                self.lb[j] = b;
                self.ub[j] = b;
            }
            BranchRule::Bound { var, lb, ub } => {
                let j = self.var_index(var)?;
                if let Some(l) = lb {
                    self.lb[j] = self.lb[j].max(l);
                }
                if let Some(u) = ub {
                    self.ub[j] = self.ub[j].min(u);
                }
                if self.lb[j] > self.ub[j] {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Intersect the local bounds with the global fixings performed since
    /// this subproblem was created. Returns false on a contradiction.
    fn refresh_global_fixings(&mut self) -> bool {
        for j in 0..self.active_vars.len() {
            let v = self.active_vars.item(j);
            if v.global_stat().contradicts(self.local_stat[j]) {
                return false;
            }
            let (glb, gub) = v.fixed_bounds();
            self.lb[j] = self.lb[j].max(glb);
            self.ub[j] = self.ub[j].min(gub);
            if self.lb[j] > self.ub[j] {
                return false;
            }
        }
        true
    }

    fn fathom(&mut self, ctx: &mut SearchCtx<'_>) -> SubOutcome {
        self.status = SubStatus::Fathomed;
        ctx.stats.subs_fathomed += 1;
        self.active_cons.release_all(ctx.con_pool);
        self.active_vars.release_all(ctx.var_pool);
        SubOutcome::Fathomed
    }

    #[allow(clippy::too_many_arguments)]
    fn sub_ctx<'a>(
        &self,
        settings: &'a Settings,
        sense: OptSense,
        x: &'a [f64],
        y: &'a [f64],
        vars: &'a [Rc<dyn Variable>],
        cons: &'a [Rc<dyn Constraint>],
        var_refs: &'a [PoolRef],
    ) -> SubCtx<'a> {
        SubCtx {
            x,
            y,
            vars,
            cons,
            var_refs,
            dual_bound: self.dual_bound,
            depth: self.depth,
            sense,
            settings,
        }
    }

    /// Fix or set integral variables whose reduced cost proves that
    /// moving them off their bound cannot beat the incumbent. At the root
    /// the result is a permanent fixing, elsewhere a subtree-local
    /// setting.
    #[allow(clippy::too_many_arguments)]
    fn fix_by_reduced_costs(
        &mut self,
        ctx: &mut SearchCtx<'_>,
        lp: &mut LpRelaxation,
        vars: &[Rc<dyn Variable>],
        cons: &[Rc<dyn Constraint>],
        x: &[f64],
        y: &[f64],
        value: f64,
        incumbent: f64,
    ) {
        let eps = ctx.settings.eps;
        for j in 0..vars.len() {
            let v = &vars[j];
            if !v.is_integral()
                || v.global_stat().pinned()
                || self.local_stat[j].pinned()
                || self.ub[j] - self.lb[j] < 1.0 - eps
            {
                continue;
            }
            let rc = reduced_cost(v.as_ref(), cons, y);
            let at_lb = (x[j] - self.lb[j]).abs() <= eps;
            let at_ub = (self.ub[j] - x[j]).abs() <= eps;

            if at_lb && ctx.sense.cannot_improve(value + rc, incumbent, eps) {
                if self.depth == 0 {
                    v.set_global_stat(FsVarStat::FixedToLower);
                } else {
                    self.local_stat[j] = FsVarStat::SetToLower;
                }
                self.ub[j] = self.lb[j];
                lp.change_ubound(j, self.lb[j]);
                ctx.stats.vars_fixed += 1;
            } else if at_ub && ctx.sense.cannot_improve(value - rc, incumbent, eps) {
                if self.depth == 0 {
                    v.set_global_stat(FsVarStat::FixedToUpper);
                } else {
                    self.local_stat[j] = FsVarStat::SetToUpper;
                }
                self.lb[j] = self.ub[j];
                lp.change_lbound(j, self.ub[j]);
                ctx.stats.vars_fixed += 1;
            }
        }
    }

    /// Process this subproblem to a terminal state (or until the clock
    /// runs out).
    pub(crate) fn process(
        &mut self,
        ctx: &mut SearchCtx<'_>,
        problem: &dyn Problem,
    ) -> EngineResult<SubOutcome> {
        let settings = ctx.settings;
        let sense = ctx.sense;

        if !self.apply_entry_rule()? || !self.refresh_global_fixings() {
            log::debug!("sub {}: contradicting settings, fathomed on entry", self.id);
            return Ok(self.fathom(ctx));
        }

        let mut lp = LpRelaxation::new(sense, (ctx.backend_factory)());
        let mut vars: Vec<Rc<dyn Variable>> = self.active_vars.items().to_vec();
        let mut var_refs: Vec<PoolRef> = self.active_vars.handles().to_vec();
        let mut cons: Vec<Rc<dyn Constraint>> = self.active_cons.items().to_vec();

        for j in 0..vars.len() {
            lp.add_col(Column::new(
                SparseVec::default(),
                vars[j].obj(),
                self.lb[j],
                self.ub[j],
            ));
        }
        for con in &cons {
            lp.add_row(con.row(&vars));
        }
        let mut slack_age: Vec<u32> = vec![0; cons.len()];

        let mut method = OptimizationMethod::Primal;
        let mut x: Vec<f64>;
        let mut y: Vec<f64>;
        let mut last_value: Option<f64> = None;
        let mut stale_rounds = 0u32;
        let mut repair_attempted = false;
        let mut rounds = 0u32;

        loop {
            self.status = SubStatus::LpSolving;
            let lp_status = lp.optimize(method)?;
            ctx.stats.lp_solves += 1;

            match lp_status {
                LpStatus::Optimal | LpStatus::Feasible => {}
                LpStatus::Infeasible => {
                    // One pricing attempt may restore feasibility before
                    // the subproblem is given up.
                    if settings.pricing && !repair_attempted {
                        repair_attempted = true;
                        let zeros_x = vec![0.0; vars.len()];
                        let zeros_y = vec![0.0; cons.len()];
                        let round = self.price_round(
                            ctx,
                            problem,
                            &mut lp,
                            &zeros_x,
                            &zeros_y,
                            &mut vars,
                            &mut var_refs,
                            &mut cons,
                        )?;
                        if let RoundResult::ColumnsFound(_) = round {
                            method = OptimizationMethod::Primal;
                            continue;
                        }
                    }
                    log::debug!("sub {}: infeasible relaxation, fathomed", self.id);
                    return Ok(self.fathom(ctx));
                }
                LpStatus::Unbounded => {
                    return Err(EngineError::LpSolve(format!(
                        "unbounded relaxation in subproblem {}",
                        self.id
                    )));
                }
                LpStatus::Error => {
                    return Err(EngineError::Internal(
                        "backend error escaped the relaxation wrapper".into(),
                    ));
                }
            }

            x = lp.x().to_vec();
            y = lp.y().to_vec();
            let value = lp.value();
            rounds += 1;

            // With column generation the LP value bounds the subproblem
            // only once no profitable column is left, so pricing runs to
            // convergence before any bound is drawn from this solve. The
            // round limit does not apply here: a bound taken from the
            // restricted relaxation would be invalid.
            if settings.pricing {
                let round = self.price_round(
                    ctx,
                    problem,
                    &mut lp,
                    &x,
                    &y,
                    &mut vars,
                    &mut var_refs,
                    &mut cons,
                )?;
                if let RoundResult::ColumnsFound(_) = round {
                    method = OptimizationMethod::Primal;
                    if ctx.out_of_time() {
                        return Ok(SubOutcome::TimedOut);
                    }
                    continue;
                }
            }

            self.dual_bound = sense.tighten_dual(self.dual_bound, value);

            if let Some(inc) = ctx.incumbent_value() {
                if sense.cannot_improve(self.dual_bound, inc, settings.eps) {
                    return Ok(self.fathom(ctx));
                }
            }

            let sub_ctx = self.sub_ctx(settings, sense, &x, &y, &vars, &cons, &var_refs);
            if problem.feasible(&sub_ctx) {
                ctx.offer_point(&vars, &x, value);
                self.status = SubStatus::IntegerFeasible;
                self.active_cons.release_all(ctx.con_pool);
                self.active_vars.release_all(ctx.var_pool);
                return Ok(SubOutcome::IntegerFeasible);
            }

            if settings.heuristic_level > 0 {
                for _ in 0..settings.heuristic_runs {
                    if let Some((point, hval)) = problem.improve(&sub_ctx) {
                        ctx.offer_point(&vars, &point, hval);
                    }
                }
                if let Some(inc) = ctx.incumbent_value() {
                    if sense.cannot_improve(self.dual_bound, inc, settings.eps) {
                        return Ok(self.fathom(ctx));
                    }
                }
            }

            if let Some(inc) = ctx.incumbent_value() {
                self.fix_by_reduced_costs(ctx, &mut lp, &vars, &cons, &x, &y, value, inc);
            }

            if ctx.out_of_time() {
                return Ok(SubOutcome::TimedOut);
            }

            match last_value {
                Some(prev) if (value - prev).abs() <= settings.eps => stale_rounds += 1,
                _ => stale_rounds = 0,
            }
            last_value = Some(value);
            if stale_rounds >= settings.tailing_off_rounds {
                log::debug!("sub {}: tailing off after {} rounds", self.id, rounds);
                break;
            }
            if rounds >= settings.max_cutting_rounds {
                break;
            }

            let round = self.separate_round(
                ctx,
                problem,
                &mut lp,
                &x,
                &y,
                &mut vars,
                &mut var_refs,
                &mut cons,
                &mut slack_age,
            )?;
            match round {
                RoundResult::CutsFound(_) => method = OptimizationMethod::Dual,
                _ => break,
            }
        }

        // The relaxation is as tight as it gets here: branch.
        let sub_ctx = self.sub_ctx(settings, sense, &x, &y, &vars, &cons, &var_refs);
        let candidates = problem.select_branching_candidates(&sub_ctx);
        if candidates.is_empty() {
            log::warn!(
                "sub {}: fractional point but no branching candidate, fathoming",
                self.id
            );
            return Ok(self.fathom(ctx));
        }
        let pick = problem.select_branching_variable(&sub_ctx, &candidates);
        let rules = problem.branch_rules(&sub_ctx, &candidates[pick]);
        if rules.is_empty() {
            return Err(EngineError::Internal(format!(
                "branching on subproblem {} produced no rules",
                self.id
            )));
        }

        let sons: Vec<Sub> = rules
            .into_iter()
            .map(|rule| {
                let id = ctx.next_id();
                self.make_son(id, rule, ctx)
            })
            .collect();
        self.status = SubStatus::Branched;
        ctx.stats.subs_branched += 1;
        self.active_cons.release_all(ctx.con_pool);
        self.active_vars.release_all(ctx.var_pool);
        Ok(SubOutcome::Branched(sons))
    }

    /// One separation round: scan the constraint pool for violated valid
    /// members, fall back to the application's separation hook, and age
    /// out dynamic constraints that stayed slack.
    #[allow(clippy::too_many_arguments)]
    fn separate_round(
        &mut self,
        ctx: &mut SearchCtx<'_>,
        problem: &dyn Problem,
        lp: &mut LpRelaxation,
        x: &[f64],
        y: &[f64],
        vars: &mut Vec<Rc<dyn Variable>>,
        var_refs: &mut Vec<PoolRef>,
        cons: &mut Vec<Rc<dyn Constraint>>,
        slack_age: &mut Vec<u32>,
    ) -> EngineResult<RoundResult> {
        let settings = ctx.settings;
        let sense = ctx.sense;
        let eps = settings.eps;
        self.status = SubStatus::Separating;

        let mut new_cons: Vec<PoolRef> = ctx
            .con_pool
            .scan_violated(
                &self.path,
                self.active_cons.slots(),
                settings.max_cuts_per_round,
                |con| {
                    let v = con.violation(vars, x);
                    (v >= settings.min_violation).then_some(v)
                },
            )
            .into_iter()
            .map(|(r, _)| r)
            .collect();

        if new_cons.is_empty() {
            let sub_ctx = self.sub_ctx(settings, sense, x, y, vars, cons, var_refs);
            let mut sctx = SeparateCtx::new(&sub_ctx);
            problem.separate(&mut sctx);
            for con in sctx.take() {
                if con.violation(vars, x) < settings.min_violation {
                    continue;
                }
                let (r, _dup) = ctx.con_pool.insert(con);
                if !self.active_cons.contains(r) && !new_cons.contains(&r) {
                    new_cons.push(r);
                }
            }
            new_cons.truncate(settings.max_cuts_per_round);
        }

        // Eliminate dynamic constraints that stayed slack and
        // dual-inactive for several consecutive rounds.
        let mut drop_rows: Vec<usize> = Vec::new();
        for (i, con) in cons.iter().enumerate() {
            let binding = y[i].abs() > eps || con.violation(vars, x) > -eps;
            if con.data().is_dynamic() && !binding {
                slack_age[i] += 1;
                if slack_age[i] >= ELIMINATION_AGE {
                    drop_rows.push(i);
                }
            } else {
                slack_age[i] = 0;
            }
        }
        if !drop_rows.is_empty() {
            self.active_cons.remove(ctx.con_pool, &drop_rows);
            lp.remove_rows(&drop_rows);
            let mut k = 0;
            slack_age.retain(|_| {
                let kept = !drop_rows.contains(&k);
                k += 1;
                kept
            });
            *cons = self.active_cons.items().to_vec();
            ctx.stats.cons_eliminated += drop_rows.len() as u64;
        }

        if new_cons.is_empty() {
            return Ok(RoundResult::Converged);
        }

        let mut added = 0;
        for r in new_cons {
            let idx = self.active_cons.insert(ctx.con_pool, r);
            if idx != self.active_cons.len() - 1 {
                continue;
            }
            let con = self.active_cons.item(idx).clone();
            lp.add_row(con.row(vars));
            slack_age.push(0);
            added += 1;
        }
        *cons = self.active_cons.items().to_vec();
        ctx.stats.cuts_added += added as u64;
        Ok(RoundResult::CutsFound(added))
    }

    /// One pricing round: scan the variable pool for valid members with
    /// profitable reduced cost, fall back to the application's pricing
    /// hook, and activate what was found.
    #[allow(clippy::too_many_arguments)]
    fn price_round(
        &mut self,
        ctx: &mut SearchCtx<'_>,
        problem: &dyn Problem,
        lp: &mut LpRelaxation,
        x: &[f64],
        y: &[f64],
        vars: &mut Vec<Rc<dyn Variable>>,
        var_refs: &mut Vec<PoolRef>,
        cons: &mut Vec<Rc<dyn Constraint>>,
    ) -> EngineResult<RoundResult> {
        let settings = ctx.settings;
        let sense = ctx.sense;
        self.status = SubStatus::Pricing;

        let profitable = |var: &dyn Variable| {
            let rc = reduced_cost(var, cons, y);
            var.priced_out(sense, rc, settings.min_violation)
                .then(|| match sense {
                    OptSense::Maximize => rc,
                    OptSense::Minimize => -rc,
                })
        };
        let mut new_vars: Vec<PoolRef> = ctx
            .var_pool
            .scan_violated(
                &self.path,
                self.active_vars.slots(),
                settings.max_cols_per_round,
                |v| profitable(v),
            )
            .into_iter()
            .map(|(r, _)| r)
            .collect();

        if new_vars.is_empty() {
            let sub_ctx = self.sub_ctx(settings, sense, x, y, vars, cons, var_refs);
            let mut pctx = PricingCtx::new(&sub_ctx);
            problem.pricing(&mut pctx);
            for var in pctx.take() {
                if profitable(var.as_ref()).is_none() {
                    continue;
                }
                let (r, _dup) = ctx.var_pool.insert(var);
                if !self.active_vars.contains(r) && !new_vars.contains(&r) {
                    new_vars.push(r);
                }
            }
            new_vars.truncate(settings.max_cols_per_round);
        }

        if new_vars.is_empty() {
            return Ok(RoundResult::Converged);
        }

        let mut added = 0;
        for &r in &new_vars {
            let Some(var) = ctx.var_pool.get(r).cloned() else {
                continue;
            };
            self.active_vars.insert(ctx.var_pool, r);
            let (l, u) = var.fixed_bounds();
            self.lb.push(l);
            self.ub.push(u);
            self.local_stat.push(FsVarStat::Free);
            lp.add_col(column_of(var.as_ref(), cons));
            added += 1;
        }
        if added == 0 {
            return Ok(RoundResult::Converged);
        }
        *vars = self.active_vars.items().to_vec();
        *var_refs = self.active_vars.handles().to_vec();
        ctx.stats.cols_added += added as u64;
        Ok(RoundResult::ColumnsFound(added))
    }
}
