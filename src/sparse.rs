//! Sparse coefficient storage.
//!
//! A [`SparseVec`] holds the nonzero coefficients of one constraint or
//! variable against an active set. [`Row`] and [`Column`] are the dense
//! materializations handed to the LP wrapper.

/// Default growth fraction applied when a sparse vector overflows.
pub const DEFAULT_REALLOC_FAC: f64 = 0.25;

/// Sense of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// a'x <= rhs
    Le,
    /// a'x >= rhs
    Ge,
    /// a'x == rhs
    Eq,
}

impl Sense {
    /// Whether a constraint with this sense is violated, given its slack
    /// `rhs - a'x` and a tolerance.
    pub fn violated(self, slack: f64, tol: f64) -> bool {
        match self {
            Sense::Le => slack < -tol,
            Sense::Ge => slack > tol,
            Sense::Eq => slack.abs() > tol,
        }
    }

    /// Violation amount for slack `rhs - a'x`; values <= 0 mean satisfied.
    pub fn violation(self, slack: f64) -> f64 {
        match self {
            Sense::Le => -slack,
            Sense::Ge => slack,
            Sense::Eq => slack.abs(),
        }
    }
}

/// Growable sparse vector with an explicit reallocation policy: on
/// overflow the capacity grows by a fraction of the current size, or to
/// an explicitly requested size via [`SparseVec::realloc`].
#[derive(Debug, Clone)]
pub struct SparseVec {
    support: Vec<usize>,
    coeff: Vec<f64>,
    cap: usize,
    realloc_fac: f64,
}

impl Default for SparseVec {
    fn default() -> Self {
        Self::new(8, DEFAULT_REALLOC_FAC)
    }
}

impl SparseVec {
    /// Create an empty vector with the given capacity and growth fraction.
    pub fn new(cap: usize, realloc_fac: f64) -> Self {
        debug_assert!(realloc_fac > 0.0);
        Self {
            support: Vec::with_capacity(cap),
            coeff: Vec::with_capacity(cap),
            cap,
            realloc_fac,
        }
    }

    /// Build a vector from (index, coefficient) entries, dropping zeros.
    pub fn from_entries(entries: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut v = Self::default();
        for (i, c) in entries {
            if c != 0.0 {
                v.insert(i, c);
            }
        }
        v
    }

    /// Number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.support.len()
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// True if no nonzeros are stored.
    pub fn is_empty(&self) -> bool {
        self.support.is_empty()
    }

    /// Append a nonzero entry, growing the backing storage if necessary.
    pub fn insert(&mut self, index: usize, value: f64) {
        if self.support.len() == self.cap {
            self.realloc(self.grown_size());
        }
        self.support.push(index);
        self.coeff.push(value);
    }

    /// Grow (or shrink down to the current length) to an explicit capacity.
    pub fn realloc(&mut self, new_cap: usize) {
        let new_cap = new_cap.max(self.support.len());
        if new_cap > self.cap {
            self.support.reserve(new_cap - self.support.len());
            self.coeff.reserve(new_cap - self.coeff.len());
        }
        self.cap = new_cap;
    }

    fn grown_size(&self) -> usize {
        let grown = (self.cap as f64 * (1.0 + self.realloc_fac)).ceil() as usize;
        grown.max(self.cap + 1)
    }

    /// Coefficient at `index` (0.0 if not stored).
    pub fn coeff(&self, index: usize) -> f64 {
        self.support
            .iter()
            .position(|&i| i == index)
            .map_or(0.0, |p| self.coeff[p])
    }

    /// Iterate over (index, coefficient) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.support.iter().copied().zip(self.coeff.iter().copied())
    }

    /// Inner product with a dense vector.
    pub fn dot(&self, x: &[f64]) -> f64 {
        self.iter().map(|(i, c)| c * x[i]).sum()
    }

    /// Remove all entries, keeping the capacity.
    pub fn clear(&mut self) {
        self.support.clear();
        self.coeff.clear();
    }
}

/// One LP row: sparse coefficients over column indices, a sense and a
/// right-hand side.
#[derive(Debug, Clone)]
pub struct Row {
    /// Coefficients indexed by LP column.
    pub coeffs: SparseVec,

    /// Row sense.
    pub sense: Sense,

    /// Right-hand side.
    pub rhs: f64,
}

impl Row {
    /// Create a row.
    pub fn new(coeffs: SparseVec, sense: Sense, rhs: f64) -> Self {
        Self { coeffs, sense, rhs }
    }

    /// Slack `rhs - a'x` at the point `x`.
    pub fn slack(&self, x: &[f64]) -> f64 {
        self.rhs - self.coeffs.dot(x)
    }

    /// True if the row is violated at `x` by more than `tol`.
    pub fn violated(&self, x: &[f64], tol: f64) -> bool {
        self.sense.violated(self.slack(x), tol)
    }
}

/// One LP column: sparse coefficients over row indices, an objective
/// coefficient and bounds.
#[derive(Debug, Clone)]
pub struct Column {
    /// Coefficients indexed by LP row.
    pub coeffs: SparseVec,

    /// Objective coefficient.
    pub obj: f64,

    /// Lower bound.
    pub lb: f64,

    /// Upper bound.
    pub ub: f64,
}

impl Column {
    /// Create a column.
    pub fn new(coeffs: SparseVec, obj: f64, lb: f64, ub: f64) -> Self {
        Self { coeffs, obj, lb, ub }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_policy() {
        let mut v = SparseVec::new(4, 0.25);
        assert_eq!(v.capacity(), 4);

        for i in 0..4 {
            v.insert(i, 1.0);
        }
        assert_eq!(v.capacity(), 4);

        // Overflow grows by 25% (at least one slot).
        v.insert(4, 1.0);
        assert_eq!(v.capacity(), 5);
        assert_eq!(v.nnz(), 5);

        // Explicit realloc to a requested size.
        v.realloc(32);
        assert_eq!(v.capacity(), 32);

        // Shrink request is clamped to the current length.
        v.realloc(2);
        assert_eq!(v.capacity(), 5);
        assert_eq!(v.nnz(), 5);
    }

    #[test]
    fn test_coeff_lookup_and_dot() {
        let v = SparseVec::from_entries([(0, 2.0), (3, -1.0), (5, 0.0)]);
        assert_eq!(v.nnz(), 2); // zero dropped
        assert_eq!(v.coeff(0), 2.0);
        assert_eq!(v.coeff(3), -1.0);
        assert_eq!(v.coeff(1), 0.0);

        let x = [1.0, 9.0, 9.0, 2.0, 9.0, 9.0];
        assert!((v.dot(&x) - 0.0).abs() < 1e-12); // 2*1 - 1*2
    }

    #[test]
    fn test_row_slack_and_violation() {
        // x0 + x1 <= 1
        let row = Row::new(SparseVec::from_entries([(0, 1.0), (1, 1.0)]), Sense::Le, 1.0);

        assert!(!row.violated(&[0.5, 0.5], 1e-6));
        assert!(row.violated(&[0.6, 0.6], 1e-6));
        assert!((row.slack(&[0.6, 0.6]) + 0.2).abs() < 1e-12);

        // x0 >= 1 violated at 0.5
        let row = Row::new(SparseVec::from_entries([(0, 1.0)]), Sense::Ge, 1.0);
        assert!(row.violated(&[0.5], 1e-6));
        assert!(!row.violated(&[1.0], 1e-6));

        // x0 == 1
        let row = Row::new(SparseVec::from_entries([(0, 1.0)]), Sense::Eq, 1.0);
        assert!(row.violated(&[0.8], 1e-6));
        assert!(row.violated(&[1.2], 1e-6));
        assert!(!row.violated(&[1.0], 1e-6));
    }

    #[test]
    fn test_violation_amount() {
        assert!((Sense::Le.violation(-0.3) - 0.3).abs() < 1e-12);
        assert!(Sense::Le.violation(0.3) < 0.0);
        assert!((Sense::Ge.violation(0.3) - 0.3).abs() < 1e-12);
        assert!((Sense::Eq.violation(-0.3) - 0.3).abs() < 1e-12);
    }
}
