//! A branch-and-cut engine for 0/1 and mixed integer programs.
//!
//! Applications implement the [`Problem`] trait: they provide the
//! variables and constraints of the formulation and, optionally, hooks
//! for separation (cutting planes), pricing (column generation), primal
//! heuristics and custom branching. The [`Master`] drives the
//! enumeration tree, the constraint and variable pools, the incumbent
//! and the termination criteria; each [`Sub`](search::Sub) solves its LP
//! relaxation through an exchangeable [`LpBackend`](lp::LpBackend), by
//! default the built-in dense simplex.
//!
//! ```no_run
//! use std::rc::Rc;
//! use branchcut::{
//!     CoefConstraint, ConVarData, Constraint, IndexedVariable, Master,
//!     OptSense, Problem, Sense, Settings, Variable,
//! };
//!
//! // max x0 + x1  s.t.  x0 + x1 <= 1, x binary
//! struct Packing;
//!
//! impl Problem for Packing {
//!     fn objective_sense(&self) -> OptSense {
//!         OptSense::Maximize
//!     }
//!
//!     fn initial_variables(&self) -> Vec<Rc<dyn Variable>> {
//!         (0..2)
//!             .map(|i| Rc::new(IndexedVariable::binary(i, 1.0)) as Rc<dyn Variable>)
//!             .collect()
//!     }
//!
//!     fn initial_constraints(&self) -> Vec<Rc<dyn Constraint>> {
//!         vec![Rc::new(CoefConstraint::new(
//!             ConVarData::global(false),
//!             [(0, 1.0), (1, 1.0)],
//!             Sense::Le,
//!             1.0,
//!         ))]
//!     }
//! }
//!
//! let mut master = Master::new(Settings::default());
//! let report = master.optimize(&Packing)?;
//! assert!(report.status.is_optimal());
//! # Ok::<(), branchcut::EngineError>(())
//! ```

pub mod convar;
pub mod error;
pub mod lp;
pub mod master;
pub mod pool;
pub mod problem;
pub mod search;
pub mod settings;
pub mod sparse;

pub use convar::{
    CoefConstraint, ConVar, ConVarData, Constraint, FsVarStat, IndexedVariable, SubId, VarType,
    Variable,
};
pub use error::{EngineError, EngineResult};
pub use lp::{DenseSimplex, LpBackend, LpStatus, OptSense, OptimizationMethod};
pub use master::{Incumbent, Master, MasterStats, SolveReport, SolveStatus};
pub use pool::{Active, Pool, PoolRef};
pub use problem::{BranchCandidate, BranchRule, PricingCtx, Problem, SeparateCtx, SubCtx};
pub use search::{RoundResult, SubStatus};
pub use settings::{parse_time_budget, EnumerationStrategy, Settings};
pub use sparse::{Column, Row, Sense, SparseVec};
