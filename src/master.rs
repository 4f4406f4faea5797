//! The master: owner of the pools, the open-subproblem queue, the
//! incumbent and the run statistics.

use std::io;
use std::rc::Rc;
use std::time::Instant;

use crate::convar::{Constraint, SubId, Variable};
use crate::error::{EngineError, EngineResult};
use crate::lp::{DenseSimplex, LpBackend, OptSense};
use crate::pool::Pool;
use crate::problem::Problem;
use crate::search::{OpenSubs, Sub, SubOutcome};
use crate::settings::{parse_time_budget, Settings};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The incumbent is a proven optimum.
    Optimal,

    /// A feasible solution exists but optimality was not proven
    /// (stopped early, or feasibility-only mode).
    Feasible,

    /// The problem has no feasible solution.
    Infeasible,

    /// The wall-clock budget ran out.
    TimeLimit,

    /// The subproblem limit was reached.
    NodeLimit,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == SolveStatus::Optimal
    }
}

/// Best feasible solution found so far.
#[derive(Debug, Clone)]
pub struct Incumbent {
    /// Objective value.
    pub value: f64,

    /// Solution point indexed by variable number.
    pub point: Vec<f64>,

    /// Number of subproblems processed when it was found.
    pub found_at: u64,
}

/// Counters of one run.
#[derive(Debug, Default, Clone)]
pub struct MasterStats {
    pub subs_processed: u64,
    pub subs_fathomed: u64,
    pub subs_branched: u64,
    pub lp_solves: u64,
    pub cuts_added: u64,
    pub cols_added: u64,
    pub cons_eliminated: u64,
    pub vars_fixed: u64,
    pub feasible_found: u64,
}

/// Outcome of [`Master::optimize`].
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub status: SolveStatus,

    /// Objective value of the incumbent, if any.
    pub value: Option<f64>,

    /// Incumbent point indexed by variable number, if any.
    pub solution: Option<Vec<f64>>,

    /// Tightest dual bound at the end of the run.
    pub dual_bound: f64,

    /// Relative gap between incumbent and dual bound, in percent.
    pub gap: Option<f64>,

    pub stats: MasterStats,
}

impl SolveReport {
    pub fn has_solution(&self) -> bool {
        self.solution.is_some()
    }
}

fn compute_gap(primal: f64, dual: f64) -> f64 {
    if !dual.is_finite() {
        return f64::INFINITY;
    }
    100.0 * (dual - primal).abs() / primal.abs().max(1.0)
}

/// Mutable state a subproblem needs from the master while it is being
/// processed, split per field so the borrows do not collide.
pub(crate) struct SearchCtx<'a> {
    pub settings: &'a Settings,
    pub sense: OptSense,
    pub con_pool: &'a mut Pool<dyn Constraint>,
    pub var_pool: &'a mut Pool<dyn Variable>,
    pub backend_factory: &'a dyn Fn() -> Box<dyn LpBackend>,
    pub stats: &'a mut MasterStats,
    pub incumbent: &'a mut Option<Incumbent>,
    pub porta_points: &'a mut Vec<Vec<u8>>,
    pub deadline: Option<Instant>,
    pub next_sub_id: &'a mut SubId,
}

impl SearchCtx<'_> {
    pub fn incumbent_value(&self) -> Option<f64> {
        self.incumbent.as_ref().map(|i| i.value)
    }

    pub fn out_of_time(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn next_id(&mut self) -> SubId {
        let id = *self.next_sub_id;
        *self.next_sub_id += 1;
        id
    }

    /// Offer a feasible point (indexed like `vars`) as incumbent and, in
    /// dump mode, record it for the PORTA writer. Returns true if the
    /// incumbent improved.
    pub fn offer_point(&mut self, vars: &[Rc<dyn Variable>], x: &[f64], value: f64) -> bool {
        let tol = self.settings.int_feas_tol;
        let dim = self
            .var_pool
            .iter()
            .map(|(_, v)| v.number() + 1)
            .max()
            .unwrap_or(0);
        let mut point = vec![0.0; dim];
        for (v, &xi) in vars.iter().zip(x) {
            point[v.number()] = if v.is_integral() { xi.round() } else { xi };
        }

        if self.settings.porta_dump {
            let zero_one = point
                .iter()
                .all(|&p| p.abs() <= tol || (p - 1.0).abs() <= tol);
            if zero_one {
                let bits: Vec<u8> = point.iter().map(|&p| (p > 0.5) as u8).collect();
                if !self.porta_points.contains(&bits) {
                    self.porta_points.push(bits);
                }
            }
        }

        self.stats.feasible_found += 1;
        let better = match self.incumbent.as_ref() {
            None => true,
            Some(inc) => self.sense.better(value, inc.value),
        };
        if better {
            log::info!(
                "new incumbent {:.6} after {} subproblems",
                value,
                self.stats.subs_processed
            );
            *self.incumbent = Some(Incumbent {
                value,
                point,
                found_at: self.stats.subs_processed,
            });
        }
        better
    }
}

/// Branch-and-cut driver.
pub struct Master {
    settings: Settings,
    backend_factory: Box<dyn Fn() -> Box<dyn LpBackend>>,
    porta_points: Vec<Vec<u8>>,
    stats: MasterStats,
}

impl Master {
    /// Create a master using the built-in dense simplex backend.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            backend_factory: Box::new(|| Box::new(DenseSimplex::default())),
            porta_points: Vec::new(),
            stats: MasterStats::default(),
        }
    }

    /// Replace the LP backend. The factory is called once per subproblem.
    pub fn with_backend<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn LpBackend> + 'static,
    {
        self.backend_factory = Box::new(factory);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Statistics of the last run.
    pub fn stats(&self) -> &MasterStats {
        &self.stats
    }

    /// Run branch-and-cut on `problem`.
    pub fn optimize(&mut self, problem: &dyn Problem) -> EngineResult<SolveReport> {
        let start = Instant::now();
        let deadline = match &self.settings.time_budget {
            Some(budget) => Some(start + parse_time_budget(budget)?),
            None => None,
        };
        let sense = problem.objective_sense();

        let mut con_pool: Pool<dyn Constraint> =
            Pool::with_capacity(self.settings.pool_capacity, self.settings.pool_realloc_fac);
        let mut var_pool: Pool<dyn Variable> =
            Pool::with_capacity(self.settings.pool_capacity, self.settings.pool_realloc_fac);

        let init_vars = problem.initial_variables();
        if init_vars.is_empty() {
            return Err(EngineError::InvalidProblem(
                "the problem has no variables".into(),
            ));
        }
        let var_refs: Vec<_> = init_vars
            .into_iter()
            .map(|v| var_pool.insert(v).0)
            .collect();
        let con_refs: Vec<_> = problem
            .initial_constraints()
            .into_iter()
            .map(|c| con_pool.insert(c).0)
            .collect();

        let mut next_sub_id: SubId = 0;
        let root = Sub::root(
            next_sub_id,
            &mut con_pool,
            &mut var_pool,
            &con_refs,
            &var_refs,
            sense.infinite_dual(),
        );
        next_sub_id += 1;

        let mut open = OpenSubs::new(self.settings.enumeration, sense);
        open.push(root);

        let mut incumbent: Option<Incumbent> = None;
        let mut stats = MasterStats::default();
        let mut porta_points: Vec<Vec<u8>> = Vec::new();
        let mut stop: Option<SolveStatus> = None;

        while let Some(mut sub) = open.pop() {
            if stats.subs_processed >= self.settings.max_subs {
                open.push(sub);
                stop = Some(SolveStatus::NodeLimit);
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                open.push(sub);
                stop = Some(SolveStatus::TimeLimit);
                break;
            }
            stats.subs_processed += 1;

            let inc_before = incumbent.as_ref().map(|i| i.value);
            let mut ctx = SearchCtx {
                settings: &self.settings,
                sense,
                con_pool: &mut con_pool,
                var_pool: &mut var_pool,
                backend_factory: &*self.backend_factory,
                stats: &mut stats,
                incumbent: &mut incumbent,
                porta_points: &mut porta_points,
                deadline,
                next_sub_id: &mut next_sub_id,
            };
            let outcome = sub.process(&mut ctx, problem)?;

            match outcome {
                SubOutcome::Fathomed | SubOutcome::IntegerFeasible => {}
                SubOutcome::Branched(sons) => {
                    for son in sons {
                        open.push(son);
                    }
                }
                SubOutcome::TimedOut => {
                    open.push(sub);
                    stop = Some(SolveStatus::TimeLimit);
                    break;
                }
            }

            let inc_now = incumbent.as_ref().map(|i| i.value);
            if inc_now != inc_before {
                if let Some(inc) = inc_now {
                    for mut dropped in open.prune(inc, self.settings.eps) {
                        dropped.release(&mut con_pool, &mut var_pool);
                    }
                }
            }

            if self.settings.feasibility_only && incumbent.is_some() {
                stop = Some(SolveStatus::Feasible);
                break;
            }

            if self.settings.verbose && stats.subs_processed % self.settings.log_freq == 0 {
                let bound = open
                    .best_dual_bound()
                    .unwrap_or_else(|| incumbent.as_ref().map_or(sense.infinite_dual(), |i| i.value));
                log::info!(
                    "{:>8} subs | {:>8} open | incumbent {:>14} | bound {:>12.4}",
                    stats.subs_processed,
                    open.len(),
                    incumbent
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |i| format!("{:.4}", i.value)),
                    bound,
                );
            }
        }

        let open_bound = open.best_dual_bound();
        for mut sub in open.drain() {
            sub.release(&mut con_pool, &mut var_pool);
        }

        let status = match stop {
            Some(s) => s,
            None => {
                if incumbent.is_some() {
                    SolveStatus::Optimal
                } else {
                    SolveStatus::Infeasible
                }
            }
        };

        let dual_bound = match (status, &incumbent, open_bound) {
            (SolveStatus::Optimal, Some(inc), _) => inc.value,
            (_, _, Some(b)) => b,
            (_, Some(inc), None) => inc.value,
            _ => sense.infinite_dual(),
        };
        let gap = incumbent.as_ref().map(|i| compute_gap(i.value, dual_bound));

        log::info!(
            "finished: {:?}, {} subproblems, {} LPs, {} cuts, {} columns in {:.2?}",
            status,
            stats.subs_processed,
            stats.lp_solves,
            stats.cuts_added,
            stats.cols_added,
            start.elapsed(),
        );

        self.stats = stats.clone();
        self.porta_points = porta_points;

        Ok(SolveReport {
            status,
            value: incumbent.as_ref().map(|i| i.value),
            solution: incumbent.map(|i| i.point),
            dual_bound,
            gap,
            stats,
        })
    }

    /// Write every recorded integer-feasible 0/1 point of the last run in
    /// PORTA's .poi format.
    ///
    /// Points recorded before a pricing round are shorter than points
    /// recorded after new variables entered; they are padded with zeros
    /// to the final dimension, which can merge entries that were distinct
    /// when recorded.
    pub fn write_porta<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        let dim = self.porta_points.iter().map(Vec::len).max().unwrap_or(0);
        writeln!(w, "DIM = {dim}")?;
        writeln!(w)?;
        writeln!(w, "CONV_SECTION")?;
        let mut written: Vec<Vec<u8>> = Vec::new();
        for point in &self.porta_points {
            let mut padded = point.clone();
            padded.resize(dim, 0);
            if written.contains(&padded) {
                continue;
            }
            let line: Vec<String> = padded.iter().map(|b| b.to_string()).collect();
            writeln!(w, "{}", line.join(" "))?;
            written.push(padded);
        }
        writeln!(w)?;
        writeln!(w, "END")?;
        Ok(())
    }

    /// Number of distinct 0/1 points recorded for the PORTA dump.
    pub fn porta_point_count(&self) -> usize {
        self.porta_points.len()
    }
}
