//! Enumeration tree: subproblems and the open-subproblem queue.

mod open;
mod sub;

pub use open::OpenSubs;
pub use sub::{Sub, SubOutcome, SubStatus};

/// Outcome of one separation/pricing round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundResult {
    /// Violated constraints were added to the relaxation.
    CutsFound(usize),

    /// Profitable variables were added to the relaxation.
    ColumnsFound(usize),

    /// Neither cuts nor columns were found; the relaxation is exact for
    /// this subproblem and the loop stops.
    Converged,
}
