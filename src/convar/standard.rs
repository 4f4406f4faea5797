//! Generic constraint and variable implementations.
//!
//! Sufficient for bindings whose constraints are plain coefficient lists
//! over variable numbers (most 0/1 graph formulations), and for tests.

use std::cell::Cell;

use super::{ConVar, ConVarData, Constraint, FsVarStat, VarType, Variable};
use crate::sparse::Sense;

/// A variable identified by its problem-wide number.
#[derive(Debug)]
pub struct IndexedVariable {
    data: ConVarData,
    number: usize,
    obj: f64,
    lb: f64,
    ub: f64,
    vtype: VarType,
    stat: Cell<FsVarStat>,
}

impl IndexedVariable {
    /// Create a variable.
    pub fn new(data: ConVarData, number: usize, obj: f64, lb: f64, ub: f64, vtype: VarType) -> Self {
        debug_assert!(lb <= ub);
        Self {
            data,
            number,
            obj,
            lb,
            ub,
            vtype,
            stat: Cell::new(FsVarStat::Free),
        }
    }

    /// Convenience constructor for a global, non-dynamic binary variable.
    pub fn binary(number: usize, obj: f64) -> Self {
        Self::new(ConVarData::global(false), number, obj, 0.0, 1.0, VarType::Binary)
    }

    /// Convenience constructor for a dynamic binary variable (column
    /// generation candidates).
    pub fn priced_binary(number: usize, obj: f64) -> Self {
        Self::new(ConVarData::global(true), number, obj, 0.0, 1.0, VarType::Binary)
    }
}

impl ConVar for IndexedVariable {
    fn data(&self) -> &ConVarData {
        &self.data
    }

    fn classify(&self) -> Option<u64> {
        // One variable per number: the number itself is the dedup key.
        Some(self.number as u64)
    }
}

impl Variable for IndexedVariable {
    fn number(&self) -> usize {
        self.number
    }

    fn obj(&self) -> f64 {
        self.obj
    }

    fn lbound(&self) -> f64 {
        self.lb
    }

    fn ubound(&self) -> f64 {
        self.ub
    }

    fn var_type(&self) -> VarType {
        self.vtype
    }

    fn global_stat(&self) -> FsVarStat {
        self.stat.get()
    }

    fn set_global_stat(&self, stat: FsVarStat) {
        self.stat.set(stat);
    }
}

/// A constraint given by explicit coefficients over variable numbers.
#[derive(Debug)]
pub struct CoefConstraint {
    data: ConVarData,
    coeffs: Vec<(usize, f64)>,
    sense: Sense,
    rhs: f64,
    class: Option<u64>,
}

impl CoefConstraint {
    /// Create a constraint from (variable number, coefficient) entries.
    pub fn new(
        data: ConVarData,
        coeffs: impl IntoIterator<Item = (usize, f64)>,
        sense: Sense,
        rhs: f64,
    ) -> Self {
        let coeffs: Vec<(usize, f64)> = coeffs.into_iter().filter(|&(_, c)| c != 0.0).collect();
        Self {
            data,
            coeffs,
            sense,
            rhs,
            class: None,
        }
    }

    /// Attach an explicit classification key.
    pub fn with_class(mut self, class: u64) -> Self {
        self.class = Some(class);
        self
    }

    /// Derive the classification key from the constraint contents
    /// (FNV-1a over the canonical coefficient list, sense and rhs).
    pub fn hashed(mut self) -> Self {
        const OFFSET: u64 = 0xcbf29ce484222325;
        const PRIME: u64 = 0x100000001b3;

        let mut entries = self.coeffs.clone();
        entries.sort_by_key(|&(i, _)| i);

        let mut h = OFFSET;
        let mut mix = |bytes: &[u8]| {
            for &b in bytes {
                h ^= b as u64;
                h = h.wrapping_mul(PRIME);
            }
        };
        for (i, c) in entries {
            mix(&i.to_le_bytes());
            mix(&c.to_bits().to_le_bytes());
        }
        mix(&[self.sense as u8]);
        mix(&self.rhs.to_bits().to_le_bytes());

        self.class = Some(h);
        self
    }

    /// Coefficient entries over variable numbers.
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.coeffs
    }
}

impl ConVar for CoefConstraint {
    fn data(&self) -> &ConVarData {
        &self.data
    }

    fn classify(&self) -> Option<u64> {
        self.class
    }
}

impl Constraint for CoefConstraint {
    fn coeff(&self, var: &dyn Variable) -> f64 {
        let number = var.number();
        self.coeffs
            .iter()
            .find(|&&(i, _)| i == number)
            .map_or(0.0, |&(_, c)| c)
    }

    fn sense(&self) -> Sense {
        self.sense
    }

    fn rhs(&self) -> f64 {
        self.rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn vars(objs: &[f64]) -> Vec<Rc<dyn Variable>> {
        objs.iter()
            .enumerate()
            .map(|(i, &o)| Rc::new(IndexedVariable::binary(i, o)) as Rc<dyn Variable>)
            .collect()
    }

    #[test]
    fn test_coeff_and_slack() {
        let vars = vars(&[1.0, 1.0, 1.0]);
        // x0 + 2 x2 <= 2
        let con = CoefConstraint::new(ConVarData::global(true), [(0, 1.0), (2, 2.0)], Sense::Le, 2.0);

        assert_eq!(con.coeff(vars[0].as_ref()), 1.0);
        assert_eq!(con.coeff(vars[1].as_ref()), 0.0);
        assert_eq!(con.coeff(vars[2].as_ref()), 2.0);

        let slack = con.slack(&vars, &[1.0, 1.0, 1.0]);
        assert!((slack + 1.0).abs() < 1e-12);
        assert!(con.violated(slack, 1e-6));
        assert!((con.violation(&vars, &[1.0, 1.0, 1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_row_materialization() {
        let vars = vars(&[1.0, 1.0, 1.0]);
        let con = CoefConstraint::new(ConVarData::global(true), [(0, 1.0), (2, 2.0)], Sense::Ge, 1.0);

        let row = con.row(&vars);
        assert_eq!(row.coeffs.nnz(), 2);
        assert_eq!(row.coeffs.coeff(0), 1.0);
        assert_eq!(row.coeffs.coeff(1), 0.0);
        assert_eq!(row.coeffs.coeff(2), 2.0);
        assert_eq!(row.rhs, 1.0);
        assert_eq!(row.sense, Sense::Ge);
    }

    #[test]
    fn test_class_key_cached() {
        let con = CoefConstraint::new(ConVarData::global(true), [(0, 1.0)], Sense::Le, 1.0)
            .with_class(42);
        assert_eq!(con.class_key(), Some(42));
        assert_eq!(con.class_key(), Some(42));
    }

    #[test]
    fn test_hashed_key_equal_for_equal_content() {
        let a = CoefConstraint::new(ConVarData::global(true), [(0, 1.0), (1, 2.0)], Sense::Le, 3.0)
            .hashed();
        // Same content, different entry order.
        let b = CoefConstraint::new(ConVarData::global(true), [(1, 2.0), (0, 1.0)], Sense::Le, 3.0)
            .hashed();
        let c = CoefConstraint::new(ConVarData::global(true), [(0, 1.0), (1, 2.0)], Sense::Le, 4.0)
            .hashed();

        assert_eq!(a.class_key(), b.class_key());
        assert_ne!(a.class_key(), c.class_key());
    }

    #[test]
    fn test_column_materialization() {
        use crate::convar::column_of;

        let v = IndexedVariable::binary(1, 5.0);
        let cons: Vec<Rc<dyn Constraint>> = vec![
            Rc::new(CoefConstraint::new(ConVarData::global(true), [(1, 3.0)], Sense::Le, 1.0)),
            Rc::new(CoefConstraint::new(ConVarData::global(true), [(0, 1.0)], Sense::Le, 1.0)),
        ];

        let col = column_of(&v, &cons);
        assert_eq!(col.obj, 5.0);
        assert_eq!(col.lb, 0.0);
        assert_eq!(col.ub, 1.0);
        assert_eq!(col.coeffs.coeff(0), 3.0);
        assert_eq!(col.coeffs.coeff(1), 0.0);
    }
}
