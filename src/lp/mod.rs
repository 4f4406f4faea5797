//! LP relaxation wrapper and solver backend seam.
//!
//! [`LpRelaxation`] owns the rows, columns and bounds of one subproblem's
//! relaxation and forwards solves to an exchangeable [`LpBackend`]. The
//! crate ships [`DenseSimplex`] as reference backend.

mod simplex;

pub use simplex::DenseSimplex;

use crate::error::{EngineError, EngineResult};
use crate::sparse::{Column, Row};

/// Optimization sense of the integer program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptSense {
    Minimize,
    Maximize,
}

impl OptSense {
    /// True if `a` is a strictly better objective value than `b`.
    pub fn better(self, a: f64, b: f64) -> bool {
        match self {
            OptSense::Maximize => a > b,
            OptSense::Minimize => a < b,
        }
    }

    /// Worst possible primal bound (no incumbent yet).
    pub fn infinite_primal(self) -> f64 {
        match self {
            OptSense::Maximize => f64::NEG_INFINITY,
            OptSense::Minimize => f64::INFINITY,
        }
    }

    /// Loosest possible dual bound.
    pub fn infinite_dual(self) -> f64 {
        match self {
            OptSense::Maximize => f64::INFINITY,
            OptSense::Minimize => f64::NEG_INFINITY,
        }
    }

    /// Monotone tightening of a dual bound: the tighter of the two.
    pub fn tighten_dual(self, current: f64, candidate: f64) -> f64 {
        match self {
            OptSense::Maximize => current.min(candidate),
            OptSense::Minimize => current.max(candidate),
        }
    }

    /// Fathoming test: a subproblem whose dual bound cannot beat the
    /// primal bound holds no better solution.
    pub fn cannot_improve(self, dual: f64, primal: f64, eps: f64) -> bool {
        match self {
            OptSense::Maximize => dual <= primal + eps,
            OptSense::Minimize => dual >= primal - eps,
        }
    }
}

/// Requested solve method. Backends may treat methods they do not
/// implement as [`OptimizationMethod::Primal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationMethod {
    /// Primal simplex; preferred after column additions.
    Primal,

    /// Dual simplex; preferred after row additions.
    Dual,

    /// Interior point with crossover to a basic solution.
    BarrierAndCrossover,

    /// Interior point without crossover.
    BarrierNoCrossover,

    /// A cheap approximate solve, acceptable for heuristics.
    Approximate,
}

/// Outcome status of one LP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    /// Solved to proven optimality.
    Optimal,

    /// A feasible but not necessarily optimal point is available.
    Feasible,

    /// The relaxation is infeasible.
    Infeasible,

    /// The relaxation is unbounded.
    Unbounded,

    /// The backend failed.
    Error,
}

/// Primal/dual solution of one LP solve.
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Primal values, one per column.
    pub x: Vec<f64>,

    /// Dual values, one per row.
    pub y: Vec<f64>,

    /// Objective value in the user's sense.
    pub value: f64,
}

/// Result of one backend solve.
#[derive(Debug, Clone)]
pub struct LpOutcome {
    pub status: LpStatus,
    pub solution: Option<LpSolution>,
}

impl LpOutcome {
    /// An outcome without a usable point.
    pub fn status_only(status: LpStatus) -> Self {
        Self {
            status,
            solution: None,
        }
    }
}

/// Borrowed view of the relaxation handed to a backend.
#[derive(Clone, Copy)]
pub struct LpView<'a> {
    pub sense: OptSense,
    pub rows: &'a [Row],
    pub obj: &'a [f64],
    pub lb: &'a [f64],
    pub ub: &'a [f64],
}

impl LpView<'_> {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.obj.len()
    }
}

/// An LP solver.
pub trait LpBackend {
    /// Solve the relaxation.
    fn optimize(&mut self, lp: LpView<'_>, method: OptimizationMethod) -> LpOutcome;

    /// Pivot the slack variables of the given rows into the basis before
    /// the rows are removed. Stateless backends need not do anything.
    fn pivot_slack_variable_in(&mut self, _rows: &[usize]) {}
}

/// The LP relaxation of one subproblem.
pub struct LpRelaxation {
    sense: OptSense,
    rows: Vec<Row>,
    obj: Vec<f64>,
    lb: Vec<f64>,
    ub: Vec<f64>,
    backend: Box<dyn LpBackend>,
    sol: Option<LpSolution>,
    solves: u64,
}

impl LpRelaxation {
    /// Create an empty relaxation.
    pub fn new(sense: OptSense, backend: Box<dyn LpBackend>) -> Self {
        Self {
            sense,
            rows: Vec::new(),
            obj: Vec::new(),
            lb: Vec::new(),
            ub: Vec::new(),
            backend,
            sol: None,
            solves: 0,
        }
    }

    pub fn sense(&self) -> OptSense {
        self.sense
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.obj.len()
    }

    /// Number of solves performed.
    pub fn solves(&self) -> u64 {
        self.solves
    }

    /// Append one column.
    pub fn add_col(&mut self, col: Column) {
        debug_assert!(col.lb <= col.ub);
        let j = self.obj.len();
        self.obj.push(col.obj);
        self.lb.push(col.lb);
        self.ub.push(col.ub);
        for (i, c) in col.coeffs.iter() {
            debug_assert!(i < self.rows.len());
            self.rows[i].coeffs.insert(j, c);
        }
        self.sol = None;
    }

    /// Append columns in order.
    pub fn add_cols(&mut self, cols: impl IntoIterator<Item = Column>) {
        for col in cols {
            self.add_col(col);
        }
    }

    /// Append one row. Its coefficients must be indexed by current columns.
    pub fn add_row(&mut self, row: Row) {
        debug_assert!(row.coeffs.iter().all(|(j, _)| j < self.obj.len()));
        self.rows.push(row);
        self.sol = None;
    }

    /// Append rows in order.
    pub fn add_rows(&mut self, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            self.add_row(row);
        }
    }

    /// Remove the rows at the given indices; the remaining rows keep their
    /// relative order.
    pub fn remove_rows(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        self.backend.pivot_slack_variable_in(indices);
        let drop: std::collections::HashSet<usize> = indices.iter().copied().collect();
        debug_assert!(drop.iter().all(|&i| i < self.rows.len()));
        let mut kept = Vec::with_capacity(self.rows.len() - drop.len());
        for (i, row) in self.rows.drain(..).enumerate() {
            if !drop.contains(&i) {
                kept.push(row);
            }
        }
        self.rows = kept;
        self.sol = None;
    }

    /// Remove the columns at the given indices, remapping the coefficient
    /// indices of every row.
    pub fn remove_cols(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let drop: std::collections::HashSet<usize> = indices.iter().copied().collect();
        debug_assert!(drop.iter().all(|&j| j < self.obj.len()));

        let mut remap = vec![usize::MAX; self.obj.len()];
        let mut next = 0;
        for j in 0..self.obj.len() {
            if !drop.contains(&j) {
                remap[j] = next;
                next += 1;
            }
        }

        let keep = |v: &mut Vec<f64>| {
            let mut k = 0;
            v.retain(|_| {
                let kept = !drop.contains(&k);
                k += 1;
                kept
            });
        };
        keep(&mut self.obj);
        keep(&mut self.lb);
        keep(&mut self.ub);

        for row in &mut self.rows {
            let entries: Vec<(usize, f64)> = row
                .coeffs
                .iter()
                .filter(|&(j, _)| !drop.contains(&j))
                .map(|(j, c)| (remap[j], c))
                .collect();
            row.coeffs.clear();
            for (j, c) in entries {
                row.coeffs.insert(j, c);
            }
        }
        self.sol = None;
    }

    /// Tighten or relax the lower bound of column `j`.
    pub fn change_lbound(&mut self, j: usize, lb: f64) {
        debug_assert!(j < self.lb.len());
        self.lb[j] = lb;
        self.sol = None;
    }

    /// Tighten or relax the upper bound of column `j`.
    pub fn change_ubound(&mut self, j: usize, ub: f64) {
        debug_assert!(j < self.ub.len());
        self.ub[j] = ub;
        self.sol = None;
    }

    pub fn lbound(&self, j: usize) -> f64 {
        self.lb[j]
    }

    pub fn ubound(&self, j: usize) -> f64 {
        self.ub[j]
    }

    pub fn row(&self, i: usize) -> &Row {
        &self.rows[i]
    }

    /// Solve the relaxation.
    pub fn optimize(&mut self, method: OptimizationMethod) -> EngineResult<LpStatus> {
        let view = LpView {
            sense: self.sense,
            rows: &self.rows,
            obj: &self.obj,
            lb: &self.lb,
            ub: &self.ub,
        };
        let outcome = self.backend.optimize(view, method);
        self.solves += 1;
        if outcome.status == LpStatus::Error {
            return Err(EngineError::LpSolve(format!(
                "backend failed on a relaxation with {} rows and {} columns",
                self.rows.len(),
                self.obj.len()
            )));
        }
        self.sol = outcome.solution;
        Ok(outcome.status)
    }

    /// True if a primal/dual point from the last solve is available.
    pub fn has_solution(&self) -> bool {
        self.sol.is_some()
    }

    /// Primal point of the last solve.
    pub fn x(&self) -> &[f64] {
        &self.solution().x
    }

    /// Dual values of the last solve.
    pub fn y(&self) -> &[f64] {
        &self.solution().y
    }

    /// Objective value of the last solve, in the user's sense.
    pub fn value(&self) -> f64 {
        self.solution().value
    }

    /// Slack of row `i` at the last solve's point.
    pub fn slack(&self, i: usize) -> f64 {
        self.rows[i].slack(self.x())
    }

    fn solution(&self) -> &LpSolution {
        self.sol
            .as_ref()
            .expect("LP solution accessed before a successful solve")
    }
}
