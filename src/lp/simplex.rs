//! Dense two-phase simplex, the crate's reference backend.
//!
//! Stateless: every solve builds a fresh tableau from the relaxation.
//! Variables are shifted to start at their lower bound, finite upper
//! bounds become extra rows, and every requested method runs the primal
//! algorithm. Adequate for the small relaxations of tests and demos;
//! production runs plug a real solver in through [`LpBackend`].

use nalgebra::{DMatrix, DVector};

use super::{LpBackend, LpOutcome, LpSolution, LpStatus, LpView, OptSense, OptimizationMethod};
use crate::sparse::Sense;

pub struct DenseSimplex {
    tol: f64,
}

impl DenseSimplex {
    pub fn new(tol: f64) -> Self {
        debug_assert!(tol > 0.0);
        Self { tol }
    }
}

impl Default for DenseSimplex {
    fn default() -> Self {
        Self::new(1e-9)
    }
}

enum RunOutcome {
    Optimal,
    Unbounded,
    IterationLimit,
}

struct Tableau {
    a: DMatrix<f64>,
    b: DVector<f64>,
    basis: Vec<usize>,
    tol: f64,
}

impl Tableau {
    fn pivot(&mut self, p: usize, c: usize, r: &mut DVector<f64>) {
        let (m, ncols) = self.a.shape();
        let piv = self.a[(p, c)];
        for j in 0..ncols {
            self.a[(p, j)] /= piv;
        }
        self.b[p] /= piv;
        for i in 0..m {
            if i == p {
                continue;
            }
            let f = self.a[(i, c)];
            if f == 0.0 {
                continue;
            }
            for j in 0..ncols {
                self.a[(i, j)] -= f * self.a[(p, j)];
            }
            self.b[i] -= f * self.b[p];
        }
        let f = r[c];
        if f != 0.0 {
            for j in 0..ncols {
                r[j] -= f * self.a[(p, j)];
            }
        }
        self.basis[p] = c;
    }

    /// Reduced costs `c_j - c_B' a_j` against the current basis.
    fn reduced_costs(&self, costs: &DVector<f64>) -> DVector<f64> {
        let (m, ncols) = self.a.shape();
        let mut r = costs.clone();
        for i in 0..m {
            let cb = costs[self.basis[i]];
            if cb == 0.0 {
                continue;
            }
            for j in 0..ncols {
                r[j] -= cb * self.a[(i, j)];
            }
        }
        r
    }

    /// Primal simplex with Bland's rule on the current canonical tableau.
    fn run(&mut self, r: &mut DVector<f64>, barred: &[bool]) -> RunOutcome {
        let (m, ncols) = self.a.shape();
        let max_iters = 1000 + 50 * (m + ncols);

        for _ in 0..max_iters {
            // Entering: smallest improving column.
            let Some(c) = (0..ncols).find(|&j| !barred[j] && r[j] > self.tol) else {
                return RunOutcome::Optimal;
            };

            // Leaving: minimum ratio, ties by smallest basic column.
            let mut leave: Option<(usize, f64)> = None;
            for i in 0..m {
                let a = self.a[(i, c)];
                if a <= self.tol {
                    continue;
                }
                let ratio = self.b[i] / a;
                let replace = match leave {
                    None => true,
                    Some((p, best)) => {
                        ratio < best - self.tol
                            || (ratio < best + self.tol && self.basis[i] < self.basis[p])
                    }
                };
                if replace {
                    leave = Some((i, ratio));
                }
            }
            let Some((p, _)) = leave else {
                return RunOutcome::Unbounded;
            };

            self.pivot(p, c, r);
        }
        RunOutcome::IterationLimit
    }
}

impl LpBackend for DenseSimplex {
    fn optimize(&mut self, lp: LpView<'_>, _method: OptimizationMethod) -> LpOutcome {
        let n = lp.n_cols();
        let m_user = lp.n_rows();
        let sign = match lp.sense {
            OptSense::Maximize => 1.0,
            OptSense::Minimize => -1.0,
        };

        for j in 0..n {
            if !lp.lb[j].is_finite() {
                return LpOutcome::status_only(LpStatus::Error);
            }
            if lp.lb[j] > lp.ub[j] + self.tol {
                return LpOutcome::status_only(LpStatus::Infeasible);
            }
        }

        // Shift every variable to start at its lower bound; finite upper
        // bounds become extra <= rows.
        let shifted_ub: Vec<f64> = (0..n).map(|j| lp.ub[j] - lp.lb[j]).collect();
        let bounded: Vec<usize> = (0..n).filter(|&j| shifted_ub[j].is_finite()).collect();
        let m = m_user + bounded.len();

        // Normalized row data: coefficients, rhs >= 0, sense, flip sign.
        let mut coeffs = DMatrix::<f64>::zeros(m, n);
        let mut rhs = DVector::<f64>::zeros(m);
        let mut senses = Vec::with_capacity(m);
        let mut flips = vec![1.0; m];

        for (i, row) in lp.rows.iter().enumerate() {
            let mut b = row.rhs;
            for (j, c) in row.coeffs.iter() {
                coeffs[(i, j)] = c;
                b -= c * lp.lb[j];
            }
            let mut sense = row.sense;
            if b < 0.0 {
                for j in 0..n {
                    coeffs[(i, j)] = -coeffs[(i, j)];
                }
                b = -b;
                flips[i] = -1.0;
                sense = match sense {
                    Sense::Le => Sense::Ge,
                    Sense::Ge => Sense::Le,
                    Sense::Eq => Sense::Eq,
                };
            }
            rhs[i] = b;
            senses.push(sense);
        }
        for (k, &j) in bounded.iter().enumerate() {
            let i = m_user + k;
            coeffs[(i, j)] = 1.0;
            rhs[i] = shifted_ub[j];
            senses.push(Sense::Le);
        }

        // Column layout: structural variables, then one slack or surplus
        // per row, then one artificial per >= or == row.
        let n_slack = m;
        let n_art = senses
            .iter()
            .filter(|s| matches!(s, Sense::Ge | Sense::Eq))
            .count();
        let ncols = n + n_slack + n_art;

        let mut a = DMatrix::<f64>::zeros(m, ncols);
        a.view_mut((0, 0), (m, n)).copy_from(&coeffs);
        let mut basis = vec![0; m];
        let mut artificial = vec![false; ncols];
        let mut unit_col = vec![0; m];
        let mut next_art = n + n_slack;
        for i in 0..m {
            match senses[i] {
                Sense::Le => {
                    a[(i, n + i)] = 1.0;
                    basis[i] = n + i;
                    unit_col[i] = n + i;
                }
                Sense::Ge => {
                    a[(i, n + i)] = -1.0;
                    a[(i, next_art)] = 1.0;
                    artificial[next_art] = true;
                    basis[i] = next_art;
                    unit_col[i] = next_art;
                    next_art += 1;
                }
                Sense::Eq => {
                    a[(i, next_art)] = 1.0;
                    artificial[next_art] = true;
                    basis[i] = next_art;
                    unit_col[i] = next_art;
                    next_art += 1;
                }
            }
        }

        let mut t = Tableau {
            a,
            b: rhs,
            basis,
            tol: self.tol,
        };
        let no_bar = vec![false; ncols];

        // Phase 1: drive the artificials to zero.
        if n_art > 0 {
            let mut c1 = DVector::<f64>::zeros(ncols);
            for j in 0..ncols {
                if artificial[j] {
                    c1[j] = -1.0;
                }
            }
            let mut r = t.reduced_costs(&c1);
            match t.run(&mut r, &no_bar) {
                RunOutcome::Optimal => {}
                RunOutcome::Unbounded | RunOutcome::IterationLimit => {
                    return LpOutcome::status_only(LpStatus::Error);
                }
            }
            let z1: f64 = (0..m).map(|i| c1[t.basis[i]] * t.b[i]).sum();
            if z1 < -self.tol {
                return LpOutcome::status_only(LpStatus::Infeasible);
            }

            // Pivot degenerate artificials out of the basis; rows with no
            // remaining nonzero are redundant and stay inert.
            for i in 0..m {
                if !artificial[t.basis[i]] {
                    continue;
                }
                if let Some(c) =
                    (0..n + n_slack).find(|&j| !artificial[j] && t.a[(i, j)].abs() > self.tol)
                {
                    let mut dummy = DVector::<f64>::zeros(ncols);
                    t.pivot(i, c, &mut dummy);
                }
            }
        }

        // Phase 2: the real objective, artificials barred.
        let mut c2 = DVector::<f64>::zeros(ncols);
        for j in 0..n {
            c2[j] = sign * lp.obj[j];
        }
        let mut r = t.reduced_costs(&c2);
        match t.run(&mut r, &artificial) {
            RunOutcome::Optimal => {}
            RunOutcome::Unbounded => return LpOutcome::status_only(LpStatus::Unbounded),
            RunOutcome::IterationLimit => return LpOutcome::status_only(LpStatus::Error),
        }

        let mut x = lp.lb.to_vec();
        for i in 0..m {
            if t.basis[i] < n {
                x[t.basis[i]] += t.b[i];
            }
        }
        let value: f64 = (0..n).map(|j| lp.obj[j] * x[j]).sum();

        // Row duals come out of the reduced costs of each row's unit
        // column, corrected for row flips and the sense sign.
        let y: Vec<f64> = (0..m_user)
            .map(|i| sign * flips[i] * -r[unit_col[i]])
            .collect();

        LpOutcome {
            status: LpStatus::Optimal,
            solution: Some(LpSolution { x, y, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::{Row, SparseVec};

    fn solve(
        sense: OptSense,
        rows: Vec<Row>,
        obj: &[f64],
        lb: &[f64],
        ub: &[f64],
    ) -> LpOutcome {
        DenseSimplex::default().optimize(
            LpView {
                sense,
                rows: &rows,
                obj,
                lb,
                ub,
            },
            OptimizationMethod::Primal,
        )
    }

    fn row(entries: &[(usize, f64)], sense: Sense, rhs: f64) -> Row {
        Row::new(SparseVec::from_entries(entries.iter().copied()), sense, rhs)
    }

    #[test]
    fn test_bounded_max() {
        // max 3x + 2y, x + y <= 4, x + 3y <= 6, x,y in [0, 10]
        let out = solve(
            OptSense::Maximize,
            vec![
                row(&[(0, 1.0), (1, 1.0)], Sense::Le, 4.0),
                row(&[(0, 1.0), (1, 3.0)], Sense::Le, 6.0),
            ],
            &[3.0, 2.0],
            &[0.0, 0.0],
            &[10.0, 10.0],
        );
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.solution.unwrap();
        assert!((sol.value - 12.0).abs() < 1e-7);
        assert!((sol.x[0] - 4.0).abs() < 1e-7);
        assert!(sol.x[1].abs() < 1e-7);
    }

    #[test]
    fn test_duals_max() {
        // max x + y, x + y <= 1: dual of the row is 1.
        let out = solve(
            OptSense::Maximize,
            vec![row(&[(0, 1.0), (1, 1.0)], Sense::Le, 1.0)],
            &[1.0, 1.0],
            &[0.0, 0.0],
            &[1.0, 1.0],
        );
        let sol = out.solution.unwrap();
        assert!((sol.value - 1.0).abs() < 1e-7);
        assert!((sol.y[0] - 1.0).abs() < 1e-7);
    }

    #[test]
    fn test_duals_min_with_ge_row() {
        // min 2x + 3y, x + y >= 4, x,y >= 0: optimum x=4, value 8, dual 2.
        let out = solve(
            OptSense::Minimize,
            vec![row(&[(0, 1.0), (1, 1.0)], Sense::Ge, 4.0)],
            &[2.0, 3.0],
            &[0.0, 0.0],
            &[f64::INFINITY, f64::INFINITY],
        );
        assert_eq!(out.status, LpStatus::Optimal);
        let sol = out.solution.unwrap();
        assert!((sol.value - 8.0).abs() < 1e-7);
        assert!((sol.x[0] - 4.0).abs() < 1e-7);
        assert!((sol.y[0] - 2.0).abs() < 1e-7);
    }

    #[test]
    fn test_equality_row() {
        // max x + 2y, x + y == 1, bounds [0,1]: y=1, value 2.
        let out = solve(
            OptSense::Maximize,
            vec![row(&[(0, 1.0), (1, 1.0)], Sense::Eq, 1.0)],
            &[1.0, 2.0],
            &[0.0, 0.0],
            &[1.0, 1.0],
        );
        let sol = out.solution.unwrap();
        assert!((sol.value - 2.0).abs() < 1e-7);
        assert!((sol.x[1] - 1.0).abs() < 1e-7);
    }

    #[test]
    fn test_infeasible() {
        // x >= 2 with x in [0, 1].
        let out = solve(
            OptSense::Maximize,
            vec![row(&[(0, 1.0)], Sense::Ge, 2.0)],
            &[1.0],
            &[0.0],
            &[1.0],
        );
        assert_eq!(out.status, LpStatus::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        let out = solve(
            OptSense::Maximize,
            vec![],
            &[1.0],
            &[0.0],
            &[f64::INFINITY],
        );
        assert_eq!(out.status, LpStatus::Unbounded);
    }

    #[test]
    fn test_shifted_lower_bounds() {
        // min x + y with x in [2, 5], y in [-1, 3], x + y >= 2.
        let out = solve(
            OptSense::Minimize,
            vec![row(&[(0, 1.0), (1, 1.0)], Sense::Ge, 2.0)],
            &[1.0, 1.0],
            &[2.0, -1.0],
            &[5.0, 3.0],
        );
        let sol = out.solution.unwrap();
        assert!((sol.value - 2.0).abs() < 1e-7);
        assert!(sol.x[0] >= 2.0 - 1e-9);
        assert!(sol.x[1] >= -1.0 - 1e-9);
    }

    #[test]
    fn test_crossed_bounds_infeasible() {
        let out = solve(OptSense::Maximize, vec![], &[1.0], &[1.0], &[0.0]);
        assert_eq!(out.status, LpStatus::Infeasible);
    }

    #[test]
    fn test_infinite_lower_bound_is_an_error() {
        let out = solve(
            OptSense::Maximize,
            vec![],
            &[1.0],
            &[f64::NEG_INFINITY],
            &[0.0],
        );
        assert_eq!(out.status, LpStatus::Error);
    }

    #[test]
    fn test_fractional_relaxation_point() {
        // Odd-cycle packing: max x0+x1+x2 with pairwise sums <= 1.
        // The relaxation optimum is 1.5 at x = (0.5, 0.5, 0.5).
        let out = solve(
            OptSense::Maximize,
            vec![
                row(&[(0, 1.0), (1, 1.0)], Sense::Le, 1.0),
                row(&[(1, 1.0), (2, 1.0)], Sense::Le, 1.0),
                row(&[(0, 1.0), (2, 1.0)], Sense::Le, 1.0),
            ],
            &[1.0, 1.0, 1.0],
            &[0.0; 3],
            &[1.0; 3],
        );
        let sol = out.solution.unwrap();
        assert!((sol.value - 1.5).abs() < 1e-7);
        for v in &sol.x {
            assert!((v - 0.5).abs() < 1e-7);
        }
    }
}
