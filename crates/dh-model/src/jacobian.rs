//! Sparse Jacobian snapshot of a constraint subset.

use crate::error::{ModelError, ModelResult};
use crate::indexing::ColumnIndex;
use dh_core::{ConId, Real, VarId};
use nalgebra::DMatrix;
use std::collections::BTreeSet;

/// One stored partial derivative (coordinate format).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianEntry {
    pub row: usize,
    pub col: usize,
    pub value: Real,
}

/// Jacobian of a set of constraints at one point.
///
/// Rows are constraint ids in the order they were requested, columns are
/// variable ids. Entries with the same (row, col) are summed when densified.
/// Built once per analysis call and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct SparseJacobian {
    rows: Vec<ConId>,
    columns: ColumnIndex,
    entries: Vec<JacobianEntry>,
}

impl SparseJacobian {
    /// Assemble from explicit rows, columns and coordinate entries.
    ///
    /// Fails with `DimensionMismatch` if an entry points outside the matrix,
    /// a row or column id is repeated, or a value is not finite.
    pub fn new(
        rows: Vec<ConId>,
        cols: Vec<VarId>,
        entries: Vec<JacobianEntry>,
    ) -> ModelResult<Self> {
        let mut seen = BTreeSet::new();
        for &row in &rows {
            if !seen.insert(row) {
                return Err(ModelError::DimensionMismatch {
                    what: format!("constraint {} requested twice", row),
                });
            }
        }

        let columns = ColumnIndex::new(cols)?;

        for entry in &entries {
            if entry.row >= rows.len() || entry.col >= columns.len() {
                return Err(ModelError::DimensionMismatch {
                    what: format!(
                        "entry ({}, {}) outside {}x{} Jacobian",
                        entry.row,
                        entry.col,
                        rows.len(),
                        columns.len()
                    ),
                });
            }
            if !entry.value.is_finite() {
                return Err(ModelError::DimensionMismatch {
                    what: format!(
                        "non-finite derivative {} at ({}, {})",
                        entry.value, entry.row, entry.col
                    ),
                });
            }
        }

        Ok(Self {
            rows,
            columns,
            entries,
        })
    }

    /// Assemble from one sparse gradient per row.
    ///
    /// Columns are every variable appearing in any gradient, sorted by id.
    pub fn from_row_gradients(
        rows: Vec<ConId>,
        gradients: &[Vec<(VarId, Real)>],
    ) -> ModelResult<Self> {
        if gradients.len() != rows.len() {
            return Err(ModelError::DimensionMismatch {
                what: format!(
                    "{} gradients supplied for {} rows",
                    gradients.len(),
                    rows.len()
                ),
            });
        }

        let cols: Vec<VarId> = gradients
            .iter()
            .flatten()
            .map(|(var, _)| *var)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let columns = ColumnIndex::new(cols)?;

        let mut entries = Vec::new();
        for (row, gradient) in gradients.iter().enumerate() {
            for &(var, value) in gradient {
                let col = columns
                    .col(var)
                    .ok_or(ModelError::UnknownVariable(var))?;
                entries.push(JacobianEntry { row, col, value });
            }
        }

        Self::new(rows, columns.into_var_ids(), entries)
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn row_ids(&self) -> &[ConId] {
        &self.rows
    }

    pub fn col_ids(&self) -> &[VarId] {
        self.columns.var_ids()
    }

    pub fn entries(&self) -> &[JacobianEntry] {
        &self.entries
    }

    /// Position of a constraint among the rows.
    pub fn row_position(&self, id: ConId) -> Option<usize> {
        self.rows.iter().position(|&r| r == id)
    }

    /// Dense copy (rows x columns).
    pub fn to_dense(&self) -> DMatrix<Real> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for entry in &self.entries {
            dense[(entry.row, entry.col)] += entry.value;
        }
        dense
    }

    /// Dense copy of the selected rows only, in the given order.
    ///
    /// Columns are unchanged.
    pub fn dense_rows(&self, positions: &[usize]) -> ModelResult<DMatrix<Real>> {
        let mut remap = vec![None; self.nrows()];
        for (new_row, &pos) in positions.iter().enumerate() {
            let nrows = self.nrows();
            let slot = remap
                .get_mut(pos)
                .ok_or_else(|| ModelError::DimensionMismatch {
                    what: format!("row {} outside {}-row Jacobian", pos, nrows),
                })?;
            *slot = Some(new_row);
        }

        let mut dense = DMatrix::zeros(positions.len(), self.ncols());
        for entry in &self.entries {
            if let Some(new_row) = remap[entry.row] {
                dense[(new_row, entry.col)] += entry.value;
            }
        }
        Ok(dense)
    }
}
