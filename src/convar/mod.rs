//! Constraints and variables.
//!
//! [`ConVarData`] is the state shared by both kinds; [`Constraint`] and
//! [`Variable`] are the capability traits a binding implements.
//! [`CoefConstraint`] and [`IndexedVariable`] are generic implementations
//! sufficient for most 0/1 graph problems.

mod base;
mod constraint;
mod standard;
mod variable;

pub use base::{ConVar, ConVarData, FsVarStat, SubId};
pub use constraint::Constraint;
pub use standard::{CoefConstraint, IndexedVariable};
pub use variable::{column_of, reduced_cost, VarType, Variable};
