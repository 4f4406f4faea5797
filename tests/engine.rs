//! End-to-end runs of the branch-and-cut engine on small instances.

use std::rc::Rc;

use branchcut::{
    CoefConstraint, ConVarData, Constraint, IndexedVariable, Master, OptSense, PricingCtx,
    Problem, SeparateCtx, Sense, Settings, SolveStatus, SubCtx, Variable,
};

fn binaries(objs: &[f64]) -> Vec<Rc<dyn Variable>> {
    objs.iter()
        .enumerate()
        .map(|(i, &o)| Rc::new(IndexedVariable::binary(i, o)) as Rc<dyn Variable>)
        .collect()
}

fn packing(pairs: &[(usize, f64)], rhs: f64) -> Rc<dyn Constraint> {
    Rc::new(CoefConstraint::new(
        ConVarData::global(false),
        pairs.iter().copied(),
        Sense::Le,
        rhs,
    ))
}

fn cover(pairs: &[(usize, f64)], rhs: f64) -> Rc<dyn Constraint> {
    Rc::new(CoefConstraint::new(
        ConVarData::global(false),
        pairs.iter().copied(),
        Sense::Ge,
        rhs,
    ))
}

/// Edge deletion on six nodes in two clusters {0,1,2} and {3,4,5}.
///
/// Nine weighted edges, one deletion variable each:
///   0: (0,3) w2   1: (1,4) w2   2: (2,5) w3      inter-cluster
///   3: (0,1) w1   4: (1,2) w2   5: (0,2) w3      cluster-one triangle
///   6: (3,4) w1   7: (4,5) w2   8: (3,5) w3      cluster-two triangle
///
/// Every pair of inter-cluster edges conflicts, so each pair must lose
/// an edge, and each cluster triangle must lose one edge. The unique
/// minimum deletion set is {0, 1, 3, 6} of total weight 6; the LP
/// relaxation sits at 5.5 with the inter-cluster variables at 1/2, so
/// the search has to branch.
struct EdgeDeletion;

impl Problem for EdgeDeletion {
    fn objective_sense(&self) -> OptSense {
        OptSense::Minimize
    }

    fn initial_variables(&self) -> Vec<Rc<dyn Variable>> {
        binaries(&[2.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0])
    }

    fn initial_constraints(&self) -> Vec<Rc<dyn Constraint>> {
        vec![
            cover(&[(0, 1.0), (1, 1.0)], 1.0),
            cover(&[(1, 1.0), (2, 1.0)], 1.0),
            cover(&[(0, 1.0), (2, 1.0)], 1.0),
            cover(&[(3, 1.0), (4, 1.0), (5, 1.0)], 1.0),
            cover(&[(6, 1.0), (7, 1.0), (8, 1.0)], 1.0),
        ]
    }
}

#[test]
fn finds_the_unique_minimum_edge_deletion_set() {
    let mut master = Master::new(Settings::default());
    let report = master.optimize(&EdgeDeletion).unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.value.unwrap() - 6.0).abs() < 1e-6);
    let x: Vec<i64> = report
        .solution
        .unwrap()
        .iter()
        .map(|v| v.round() as i64)
        .collect();
    assert_eq!(x, vec![1, 1, 0, 1, 0, 0, 1, 0, 0]);

    // The fractional inter-cluster point forces at least one branch.
    assert!(report.stats.subs_branched >= 1);
    assert_eq!(report.gap, Some(0.0));
}

/// Triangle stable set with lazy edge constraints: the formulation
/// starts without any rows and the separation hook produces the pairwise
/// packing constraints on demand. Feasibility therefore has to check the
/// full edge set, not just integrality.
struct LazyTriangle;

const EDGES: [(usize, usize); 3] = [(0, 1), (1, 2), (0, 2)];

impl Problem for LazyTriangle {
    fn objective_sense(&self) -> OptSense {
        OptSense::Maximize
    }

    fn initial_variables(&self) -> Vec<Rc<dyn Variable>> {
        binaries(&[1.0, 1.0, 1.0])
    }

    fn feasible(&self, ctx: &SubCtx<'_>) -> bool {
        let tol = ctx.settings.int_feas_tol;
        let integral = ctx
            .x
            .iter()
            .all(|&v| (v - v.round()).abs() <= tol);
        integral
            && EDGES
                .iter()
                .all(|&(a, b)| value_of(ctx, a) + value_of(ctx, b) <= 1.0 + tol)
    }

    fn separate(&self, ctx: &mut SeparateCtx<'_, '_>) -> usize {
        let mut found = 0;
        for &(a, b) in &EDGES {
            let lhs = value_of(ctx.sub, a) + value_of(ctx.sub, b);
            if lhs > 1.0 + ctx.sub.settings.min_violation {
                ctx.add(Rc::new(
                    CoefConstraint::new(
                        ConVarData::global(true),
                        [(a, 1.0), (b, 1.0)],
                        Sense::Le,
                        1.0,
                    )
                    .hashed(),
                ));
                found += 1;
            }
        }
        found
    }
}

fn value_of(ctx: &SubCtx<'_>, number: usize) -> f64 {
    ctx.vars
        .iter()
        .zip(ctx.x)
        .find(|(v, _)| v.number() == number)
        .map_or(0.0, |(_, &x)| x)
}

#[test]
fn separation_and_branching_solve_the_lazy_triangle() {
    let mut master = Master::new(Settings::default());
    let report = master.optimize(&LazyTriangle).unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.value.unwrap() - 1.0).abs() < 1e-6);
    let ones = report
        .solution
        .unwrap()
        .iter()
        .filter(|&&v| (v - 1.0).abs() < 1e-6)
        .count();
    assert_eq!(ones, 1);

    // All three edge constraints come out of the separation hook, and
    // the fractional point (1/2, 1/2, 1/2) forces at least one branch.
    assert!(report.stats.cuts_added >= 3);
    assert!(report.stats.subs_branched >= 1);
}

#[test]
fn feasibility_only_stops_at_the_first_solution() {
    let mut master = Master::new(Settings::default().check_feasibility_only());
    let report = master.optimize(&LazyTriangle).unwrap();

    assert_eq!(report.status, SolveStatus::Feasible);
    assert!(report.has_solution());
}

/// Column generation: the formulation starts with one edge variable and
/// the pricing hook offers a second, more valuable one sharing the same
/// packing constraint.
struct PricedEdge;

impl Problem for PricedEdge {
    fn objective_sense(&self) -> OptSense {
        OptSense::Maximize
    }

    fn initial_variables(&self) -> Vec<Rc<dyn Variable>> {
        vec![Rc::new(IndexedVariable::binary(0, 1.0))]
    }

    fn initial_constraints(&self) -> Vec<Rc<dyn Constraint>> {
        vec![packing(&[(0, 1.0), (1, 1.0)], 1.0)]
    }

    fn pricing(&self, ctx: &mut PricingCtx<'_, '_>) -> usize {
        ctx.add(Rc::new(IndexedVariable::priced_binary(1, 2.0)));
        1
    }
}

#[test]
fn pricing_pulls_in_the_profitable_column() {
    let mut master = Master::new(Settings::default().with_pricing(true));
    let report = master.optimize(&PricedEdge).unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.value.unwrap() - 2.0).abs() < 1e-6);
    let x = report.solution.unwrap();
    assert_eq!(x.len(), 2);
    assert!(x[0].abs() < 1e-6);
    assert!((x[1] - 1.0).abs() < 1e-6);
    assert_eq!(report.stats.cols_added, 1);
}

#[test]
fn round_limit_does_not_cut_pricing_short() {
    let mut settings = Settings::default().with_pricing(true);
    settings.max_cutting_rounds = 1;
    let mut master = Master::new(settings);
    let report = master.optimize(&PricedEdge).unwrap();

    // The bound of the restricted relaxation (1.0) must not be certified:
    // pricing still runs and brings in the column worth 2.0.
    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.value.unwrap() - 2.0).abs() < 1e-6);
    assert_eq!(report.stats.cols_added, 1);
}

/// Odd cycle with a primal heuristic: the incumbent comes from the
/// `improve` hook at the root and every son is then fathomed by bound.
struct HeuristicCycle;

impl Problem for HeuristicCycle {
    fn objective_sense(&self) -> OptSense {
        OptSense::Maximize
    }

    fn initial_variables(&self) -> Vec<Rc<dyn Variable>> {
        binaries(&[1.0, 1.0, 1.0])
    }

    fn initial_constraints(&self) -> Vec<Rc<dyn Constraint>> {
        EDGES
            .iter()
            .map(|&(a, b)| packing(&[(a, 1.0), (b, 1.0)], 1.0))
            .collect()
    }

    fn improve(&self, ctx: &SubCtx<'_>) -> Option<(Vec<f64>, f64)> {
        // Greedy rounding: keep the first vertex, drop its neighbors.
        let mut point = vec![0.0; ctx.x.len()];
        point[0] = 1.0;
        Some((point, 1.0))
    }
}

#[test]
fn heuristic_incumbent_lets_the_tree_fathom() {
    let mut settings = Settings::default();
    settings.heuristic_level = 1;
    let mut master = Master::new(settings);
    let report = master.optimize(&HeuristicCycle).unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.value.unwrap() - 1.0).abs() < 1e-6);
    let x: Vec<i64> = report
        .solution
        .unwrap()
        .iter()
        .map(|v| v.round() as i64)
        .collect();
    assert_eq!(x, vec![1, 0, 0]);
    assert!(report.stats.feasible_found >= 1);
}

/// Same instance as [`LazyTriangle`] but recording the node's dual bound
/// at every separation call.
struct BoundProbe {
    seen: std::cell::RefCell<Vec<f64>>,
}

impl Problem for BoundProbe {
    fn objective_sense(&self) -> OptSense {
        OptSense::Maximize
    }

    fn initial_variables(&self) -> Vec<Rc<dyn Variable>> {
        binaries(&[1.0, 1.0, 1.0])
    }

    fn feasible(&self, ctx: &SubCtx<'_>) -> bool {
        LazyTriangle.feasible(ctx)
    }

    fn separate(&self, ctx: &mut SeparateCtx<'_, '_>) -> usize {
        self.seen.borrow_mut().push(ctx.sub.dual_bound);
        LazyTriangle.separate(ctx)
    }
}

#[test]
fn dual_bound_tightens_monotonically_across_rounds() {
    let probe = BoundProbe {
        seen: std::cell::RefCell::new(Vec::new()),
    };
    let mut master = Master::new(Settings::default().with_max_subs(1));
    master.optimize(&probe).unwrap();

    let seen = probe.seen.borrow();
    // Round one sees the unconstrained bound of 3, the cut round 1.5;
    // under maximization the bound may only come down.
    assert!(seen.len() >= 2);
    assert!(seen.windows(2).all(|w| w[1] <= w[0] + 1e-9));
    assert!((seen[0] - 3.0).abs() < 1e-6);
    assert!((seen[1] - 1.5).abs() < 1e-6);
}

/// Minimization: cover one edge with the cheaper endpoint.
struct MinCover;

impl Problem for MinCover {
    fn objective_sense(&self) -> OptSense {
        OptSense::Minimize
    }

    fn initial_variables(&self) -> Vec<Rc<dyn Variable>> {
        binaries(&[1.0, 2.0])
    }

    fn initial_constraints(&self) -> Vec<Rc<dyn Constraint>> {
        vec![Rc::new(CoefConstraint::new(
            ConVarData::global(false),
            [(0, 1.0), (1, 1.0)],
            Sense::Ge,
            1.0,
        ))]
    }
}

#[test]
fn minimization_picks_the_cheap_cover() {
    let mut master = Master::new(Settings::default());
    let report = master.optimize(&MinCover).unwrap();

    assert_eq!(report.status, SolveStatus::Optimal);
    assert!((report.value.unwrap() - 1.0).abs() < 1e-6);
    let x = report.solution.unwrap();
    assert!((x[0] - 1.0).abs() < 1e-6);
    assert!(x[1].abs() < 1e-6);
}
