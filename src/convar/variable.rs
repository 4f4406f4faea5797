//! The variable capability trait.

use std::rc::Rc;

use super::{ConVar, Constraint, FsVarStat};
use crate::lp::OptSense;
use crate::sparse::{Column, SparseVec};

/// Integrality class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    /// 0/1 variable.
    Binary,

    /// General integer variable.
    Integer,

    /// Continuous variable.
    Continuous,
}

/// A variable of the integer program.
pub trait Variable: ConVar {
    /// Problem-wide stable index of this variable. Constraints may use it
    /// to look up coefficients; incumbent points and PORTA dumps are
    /// indexed by it.
    fn number(&self) -> usize;

    /// Objective coefficient.
    fn obj(&self) -> f64;

    /// Global lower bound.
    fn lbound(&self) -> f64;

    /// Global upper bound.
    fn ubound(&self) -> f64;

    /// Integrality class.
    fn var_type(&self) -> VarType;

    /// Global fixing status.
    fn global_stat(&self) -> FsVarStat;

    /// Update the global fixing status (reduced-cost fixing at the root).
    fn set_global_stat(&self, stat: FsVarStat);

    /// True for binary and integer variables.
    fn is_integral(&self) -> bool {
        matches!(self.var_type(), VarType::Binary | VarType::Integer)
    }

    /// Whether the variable is priced out by more than `tol`, given its
    /// reduced cost: profitable columns have positive reduced cost under
    /// maximization and negative under minimization.
    fn priced_out(&self, sense: OptSense, reduced_cost: f64, tol: f64) -> bool {
        match sense {
            OptSense::Maximize => reduced_cost > tol,
            OptSense::Minimize => reduced_cost < -tol,
        }
    }

    /// Global bounds after applying the fixing status.
    fn fixed_bounds(&self) -> (f64, f64) {
        match self.global_stat() {
            FsVarStat::FixedToLower | FsVarStat::SetToLower => (self.lbound(), self.lbound()),
            FsVarStat::FixedToUpper | FsVarStat::SetToUpper => (self.ubound(), self.ubound()),
            FsVarStat::Free => (self.lbound(), self.ubound()),
        }
    }
}

/// Materialize the LP column of `var` against an active constraint set;
/// row order follows `cons`.
pub fn column_of(var: &dyn Variable, cons: &[Rc<dyn Constraint>]) -> Column {
    let mut coeffs = SparseVec::default();
    for (i, c) in cons.iter().enumerate() {
        let a = c.coeff(var);
        if a != 0.0 {
            coeffs.insert(i, a);
        }
    }
    let (lb, ub) = var.fixed_bounds();
    Column::new(coeffs, var.obj(), lb, ub)
}

/// Reduced cost of `var` against the duals `y` of an active constraint
/// set: `obj - y'a`.
pub fn reduced_cost(var: &dyn Variable, cons: &[Rc<dyn Constraint>], y: &[f64]) -> f64 {
    debug_assert!(y.len() >= cons.len());
    let ya: f64 = cons
        .iter()
        .zip(y)
        .map(|(c, yi)| yi * c.coeff(var))
        .sum();
    var.obj() - ya
}
