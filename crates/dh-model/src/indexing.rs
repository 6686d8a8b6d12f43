//! Stable column indexing for Jacobian assembly.
//!
//! Provides a bidirectional mapping between variable ids and contiguous
//! Jacobian column indices (0..N).

use dh_core::VarId;

use crate::error::{ModelError, ModelResult};

/// Index map from variable ids to contiguous Jacobian columns.
///
/// O(1) lookup in both directions.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    /// Contiguous list of variable ids (column -> VarId).
    var_ids: Vec<VarId>,

    /// Reverse lookup: VarId -> column.
    /// Sized to max(VarId.index) + 1; None if that id is not a column.
    var_to_col: Vec<Option<usize>>,
}

impl ColumnIndex {
    /// Build an index from column ids in column order.
    ///
    /// Duplicate ids are a dimension mismatch: a column can only appear once.
    pub fn new(var_ids: Vec<VarId>) -> ModelResult<Self> {
        let max_idx = var_ids.iter().map(|id| id.slot()).max().unwrap_or(0);
        let mut var_to_col = vec![None; max_idx + 1];

        for (col, &id) in var_ids.iter().enumerate() {
            if var_to_col[id.slot()].replace(col).is_some() {
                return Err(ModelError::DimensionMismatch {
                    what: format!("variable {} appears in two Jacobian columns", id),
                });
            }
        }

        Ok(Self {
            var_ids,
            var_to_col,
        })
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.var_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.var_ids.is_empty()
    }

    /// Column of a variable, if it is one.
    pub fn col(&self, id: VarId) -> Option<usize> {
        self.var_to_col.get(id.slot()).and_then(|&opt| opt)
    }

    /// Variable of a column (panics if out of bounds).
    pub fn var_id(&self, col: usize) -> VarId {
        self.var_ids[col]
    }

    /// All column ids in column order.
    pub fn var_ids(&self) -> &[VarId] {
        &self.var_ids
    }

    pub fn into_var_ids(self) -> Vec<VarId> {
        self.var_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_index_round_trip() {
        let ids = vec![VarId::from_index(4), VarId::from_index(1), VarId::from_index(7)];
        let index = ColumnIndex::new(ids.clone()).unwrap();

        assert_eq!(index.len(), 3);
        for (col, id) in ids.iter().enumerate() {
            assert_eq!(index.col(*id), Some(col));
            assert_eq!(index.var_id(col), *id);
        }
    }

    #[test]
    fn column_index_missing_id() {
        let index = ColumnIndex::new(vec![VarId::from_index(0)]).unwrap();
        assert_eq!(index.col(VarId::from_index(999)), None);
        assert_eq!(index.col(VarId::from_index(0)), Some(0));
    }

    #[test]
    fn column_index_rejects_duplicates() {
        let id = VarId::from_index(2);
        assert!(ColumnIndex::new(vec![id, id]).is_err());
    }

    #[test]
    fn empty_column_index() {
        let index = ColumnIndex::new(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.col(VarId::from_index(0)), None);
    }
}
