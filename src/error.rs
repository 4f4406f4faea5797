//! Error types for the branch-and-cut engine.

use thiserror::Error;

/// Errors that abort a branch-and-cut run.
///
/// Only genuinely fatal conditions are errors: a locally infeasible
/// subproblem is fathomed, an exhausted time budget yields a
/// [`SolveStatus::TimeLimit`](crate::master::SolveStatus), neither is an
/// `Err`.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Problem validation failed
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// LP backend failure, or an unbounded relaxation where none was expected
    #[error("LP solve failed: {0}")]
    LpSolve(String),

    /// Malformed wall-clock budget string
    #[error("Invalid time budget {0:?}: expected \"HH:MM:SS\"")]
    InvalidTimeBudget(String),

    /// Internal engine error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
