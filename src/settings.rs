//! Configuration settings for the branch-and-cut engine.

use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Selection strategy for open subproblems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumerationStrategy {
    /// Always select the open subproblem with the best dual bound.
    #[default]
    BestBound,

    /// Depth-first search (helps find feasible solutions quickly).
    DepthFirst,
}

/// Master-level settings.
///
/// Every tolerance and threshold the engine consults is a field here,
/// including the support-graph rounding threshold that separation
/// heuristics read through [`SubCtx`](crate::problem::SubCtx).
#[derive(Debug, Clone)]
pub struct Settings {
    // === Termination criteria ===
    /// Maximum number of subproblems to process.
    pub max_subs: u64,

    /// Wall-clock budget as "HH:MM:SS" ("MM:SS" and "SS" are accepted).
    /// Checked between cutting-plane rounds and between tree nodes, never
    /// inside an LP solve.
    pub time_budget: Option<String>,

    /// Stop at the first integer-feasible solution instead of proving
    /// optimality. The reported solution is an indicator only.
    pub feasibility_only: bool,

    // === Cutting-plane / pricing loop ===
    /// Maximum separation/pricing rounds per subproblem before branching.
    pub max_cutting_rounds: u32,

    /// Rounds without dual-bound progress before branching (tailing off).
    pub tailing_off_rounds: u32,

    /// Maximum constraints pulled from a pool scan per round.
    pub max_cuts_per_round: usize,

    /// Maximum variables pulled from a pool scan per round.
    pub max_cols_per_round: usize,

    /// Enable column generation (pricing).
    pub pricing: bool,

    // === Tolerances ===
    /// Minimum violation for a constraint or variable to enter the LP.
    pub min_violation: f64,

    /// Integer feasibility tolerance: x is integral if |x - round(x)| <= tol.
    pub int_feas_tol: f64,

    /// General numeric zero tolerance.
    pub eps: f64,

    // === Branching ===
    /// Fractionality beyond which a branching candidate counts as strongly
    /// violated; such candidates are preferred, ties broken by index order.
    pub strong_violation: f64,

    // === Problem-side knobs transported by the engine ===
    /// Rounding threshold used by bindings when building a support graph
    /// from a fractional LP solution.
    pub support_threshold: f64,

    /// Primal heuristic level (0 disables the `improve` callback).
    pub heuristic_level: u32,

    /// Number of primal heuristic invocations per feasible solution.
    pub heuristic_runs: u32,

    // === Pools ===
    /// Initial slot capacity of the default pools.
    pub pool_capacity: usize,

    /// Growth factor applied when a pool or sparse vector overflows
    /// (grow by this fraction of the current size).
    pub pool_realloc_fac: f64,

    // === Search ===
    /// Open-subproblem selection strategy.
    pub enumeration: EnumerationStrategy,

    // === Output ===
    /// Record every integer-feasible 0/1 point for a PORTA dump.
    pub porta_dump: bool,

    /// Print progress information.
    pub verbose: bool,

    /// Log frequency (print every N subproblems).
    pub log_freq: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_subs: 1_000_000,
            time_budget: None,
            feasibility_only: false,

            max_cutting_rounds: 50,
            tailing_off_rounds: 8,
            max_cuts_per_round: 100,
            max_cols_per_round: 100,
            pricing: false,

            min_violation: 1e-4,
            int_feas_tol: 1e-6,
            eps: 1e-7,

            strong_violation: 0.25,
            support_threshold: 0.3,
            heuristic_level: 0,
            heuristic_runs: 1,

            pool_capacity: 256,
            pool_realloc_fac: 0.25,

            enumeration: EnumerationStrategy::default(),

            porta_dump: false,
            verbose: false,
            log_freq: 100,
        }
    }
}

impl Settings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        let mut s = Self::default();
        s.verbose = true;
        s.log_freq = 1;
        s
    }

    /// Set the wall-clock budget from a "HH:MM:SS" string.
    pub fn with_time_budget(mut self, budget: impl Into<String>) -> Self {
        self.time_budget = Some(budget.into());
        self
    }

    /// Set the maximum number of subproblems.
    pub fn with_max_subs(mut self, subs: u64) -> Self {
        self.max_subs = subs;
        self
    }

    /// Enable or disable column generation.
    pub fn with_pricing(mut self, pricing: bool) -> Self {
        self.pricing = pricing;
        self
    }

    /// Use depth-first subproblem selection.
    pub fn depth_first(mut self) -> Self {
        self.enumeration = EnumerationStrategy::DepthFirst;
        self
    }

    /// Stop at the first feasible solution.
    pub fn check_feasibility_only(mut self) -> Self {
        self.feasibility_only = true;
        self
    }

    /// Record integer-feasible points for a PORTA dump.
    pub fn with_porta_dump(mut self) -> Self {
        self.porta_dump = true;
        self
    }
}

/// Parse a wall-clock budget of the form "HH:MM:SS", "MM:SS" or "SS".
pub fn parse_time_budget(budget: &str) -> EngineResult<Duration> {
    let bad = || EngineError::InvalidTimeBudget(budget.to_string());

    let parts: Vec<&str> = budget.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(bad());
    }

    let mut fields = [0u64; 3]; // hours, minutes, seconds
    for (slot, part) in fields[3 - parts.len()..].iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| bad())?;
    }
    let [hours, minutes, seconds] = fields;

    // Minutes and seconds must be in range when a larger unit is given.
    if parts.len() >= 2 && seconds >= 60 {
        return Err(bad());
    }
    if parts.len() == 3 && minutes >= 60 {
        return Err(bad());
    }

    Ok(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_budget() {
        assert_eq!(parse_time_budget("01:30:00").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_time_budget("00:00:00").unwrap(), Duration::from_secs(0));
        assert_eq!(parse_time_budget("02:15").unwrap(), Duration::from_secs(135));
        assert_eq!(parse_time_budget("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_time_budget_rejects_garbage() {
        assert!(parse_time_budget("").is_err());
        assert!(parse_time_budget("1:2:3:4").is_err());
        assert!(parse_time_budget("00:61:00").is_err());
        assert!(parse_time_budget("00:00:75").is_err());
        assert!(parse_time_budget("abc").is_err());
    }

    #[test]
    fn test_builders() {
        let s = Settings::default()
            .with_time_budget("00:10:00")
            .with_max_subs(42)
            .with_pricing(true)
            .depth_first();

        assert_eq!(s.time_budget.as_deref(), Some("00:10:00"));
        assert_eq!(s.max_subs, 42);
        assert!(s.pricing);
        assert_eq!(s.enumeration, EnumerationStrategy::DepthFirst);
    }
}
