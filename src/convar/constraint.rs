//! The constraint capability trait.

use std::rc::Rc;

use super::{ConVar, Variable};
use crate::sparse::{Row, Sense, SparseVec};

/// A linear constraint over the variable space.
///
/// Coefficients are computable per variable without materializing any
/// matrix; [`Constraint::row`] produces the materialization against one
/// active variable set.
pub trait Constraint: ConVar {
    /// Coefficient of `var` in this constraint.
    fn coeff(&self, var: &dyn Variable) -> f64;

    /// Constraint sense.
    fn sense(&self) -> Sense;

    /// Right-hand side.
    fn rhs(&self) -> f64;

    /// Slack `rhs - a'x` against an active variable set.
    fn slack(&self, vars: &[Rc<dyn Variable>], x: &[f64]) -> f64 {
        debug_assert_eq!(vars.len(), x.len());
        let ax: f64 = vars
            .iter()
            .zip(x)
            .map(|(v, xi)| self.coeff(v.as_ref()) * xi)
            .sum();
        self.rhs() - ax
    }

    /// Whether the constraint is violated given its slack, within `tol`.
    fn violated(&self, slack: f64, tol: f64) -> bool {
        self.sense().violated(slack, tol)
    }

    /// Violation amount at `x` (<= 0 means satisfied).
    fn violation(&self, vars: &[Rc<dyn Variable>], x: &[f64]) -> f64 {
        self.sense().violation(self.slack(vars, x))
    }

    /// Materialize the LP row of this constraint against an active
    /// variable set; column order follows `vars`.
    fn row(&self, vars: &[Rc<dyn Variable>]) -> Row {
        let mut coeffs = SparseVec::default();
        for (j, v) in vars.iter().enumerate() {
            let c = self.coeff(v.as_ref());
            if c != 0.0 {
                coeffs.insert(j, c);
            }
        }
        Row::new(coeffs, self.sense(), self.rhs())
    }
}
