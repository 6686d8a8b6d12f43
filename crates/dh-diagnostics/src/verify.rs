//! Minimality check for degenerate sets.

use dh_core::{ConId, Real};
use dh_model::SparseJacobian;
use nalgebra::DMatrix;

use crate::error::{DiagnosticError, DiagnosticResult};
use crate::rank::decompose;

/// Row-rank deficiency of a dense matrix at absolute threshold `threshold`.
pub fn row_deficiency(dense: &DMatrix<Real>, threshold: Real) -> DiagnosticResult<usize> {
    Ok(decompose(dense)?.count_below(threshold))
}

/// True when the rows of `members` are linearly dependent with exactly one
/// dependency and dropping any single member leaves independent rows.
pub fn verify_irreducible(
    jacobian: &SparseJacobian,
    members: &[ConId],
    threshold: Real,
) -> DiagnosticResult<bool> {
    if members.is_empty() {
        return Ok(false);
    }
    let positions = members
        .iter()
        .map(|&id| {
            jacobian
                .row_position(id)
                .ok_or_else(|| DiagnosticError::InvalidConstraintSet {
                    what: format!("constraint {id} is not a Jacobian row"),
                })
        })
        .collect::<DiagnosticResult<Vec<usize>>>()?;

    let whole = jacobian.dense_rows(&positions)?;
    if row_deficiency(&whole, threshold)? != 1 {
        return Ok(false);
    }

    for skip in 0..positions.len() {
        let rest: Vec<usize> = positions
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != skip)
            .map(|(_, &p)| p)
            .collect();
        let sub = jacobian.dense_rows(&rest)?;
        if row_deficiency(&sub, threshold)? != 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dh_core::VarId;
    use dh_model::JacobianEntry;

    fn jacobian(rows: &[&[f64]]) -> SparseJacobian {
        let ncols = rows.first().map_or(0, |r| r.len());
        let row_ids: Vec<ConId> = (0..rows.len() as u32).map(ConId::from_index).collect();
        let cols: Vec<VarId> = (0..ncols as u32).map(VarId::from_index).collect();
        let mut entries = Vec::new();
        for (row, values) in rows.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                if value != 0.0 {
                    entries.push(JacobianEntry { row, col, value });
                }
            }
        }
        SparseJacobian::new(row_ids, cols, entries).unwrap()
    }

    fn ids(idx: &[u32]) -> Vec<ConId> {
        idx.iter().copied().map(ConId::from_index).collect()
    }

    #[test]
    fn circuit_is_irreducible() {
        let j = jacobian(&[&[1.0, 0.0], &[0.0, 1.0], &[1.0, 1.0]]);
        assert!(verify_irreducible(&j, &ids(&[0, 1, 2]), 1e-9).unwrap());
        assert!(!verify_irreducible(&j, &ids(&[0, 1]), 1e-9).unwrap());
    }

    #[test]
    fn superset_of_circuit_is_not_irreducible() {
        let j = jacobian(&[&[1.0, 0.0], &[1.0, 0.0], &[0.0, 1.0]]);
        assert!(verify_irreducible(&j, &ids(&[0, 1]), 1e-9).unwrap());
        assert!(!verify_irreducible(&j, &ids(&[0, 1, 2]), 1e-9).unwrap());
    }

    #[test]
    fn unknown_member_is_an_error() {
        let j = jacobian(&[&[1.0]]);
        assert!(verify_irreducible(&j, &ids(&[4]), 1e-9).is_err());
    }
}
