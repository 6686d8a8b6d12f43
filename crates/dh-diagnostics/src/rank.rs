//! Rank analysis of the equality-constraint Jacobian.
//!
//! The deficiency is the number of singular values below the threshold ε.
//! A Jacobian with more rows than columns is padded with zero columns
//! before decomposition, so that every row owns a singular value and a
//! left singular vector; the padding contributes `rows - cols` zero
//! singular values, one per surplus equation.

use dh_core::{ConId, Real};
use dh_model::{ModelAdapter, ModelError, SparseJacobian};
use nalgebra::{DMatrix, DVector, SVD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SingularValueThreshold;
use crate::error::{DiagnosticError, DiagnosticResult, SolverStage};

/// One singular value with its left singular vector.
#[derive(Debug, Clone)]
pub struct SingularPair {
    pub value: Real,
    pub left: DVector<Real>,
}

/// Singular values and left singular vectors, descending by value.
#[derive(Debug, Clone, Default)]
pub struct SvdResult {
    pairs: Vec<SingularPair>,
}

impl SvdResult {
    pub fn pairs(&self) -> &[SingularPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn values(&self) -> Vec<Real> {
        self.pairs.iter().map(|p| p.value).collect()
    }

    pub fn sigma_max(&self) -> Real {
        self.pairs.first().map_or(0.0, |p| p.value)
    }

    /// Number of singular values below `threshold`.
    ///
    /// An exact zero always counts, so an all-zero matrix is fully
    /// deficient even under a relative threshold.
    pub fn count_below(&self, threshold: Real) -> usize {
        self.pairs
            .iter()
            .filter(|p| p.value < threshold || p.value == 0.0)
            .count()
    }
}

/// SVD of a dense matrix, keeping the left singular vectors.
pub fn decompose(dense: &DMatrix<Real>) -> DiagnosticResult<SvdResult> {
    let (nrows, ncols) = dense.shape();
    if nrows == 0 {
        return Ok(SvdResult::default());
    }

    let work = if ncols < nrows {
        dense.clone().resize_horizontally(nrows, 0.0)
    } else {
        dense.clone()
    };

    let svd = SVD::try_new(work, true, false, Real::EPSILON, 0).ok_or_else(|| {
        DiagnosticError::SolverFailure {
            stage: SolverStage::Svd,
            what: format!("SVD of {nrows}x{ncols} Jacobian did not converge"),
        }
    })?;
    let u = svd.u.ok_or_else(|| DiagnosticError::SolverFailure {
        stage: SolverStage::Svd,
        what: "left singular vectors were not computed".to_string(),
    })?;

    let values = svd.singular_values;
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let pairs = order
        .into_iter()
        .map(|k| SingularPair {
            value: values[k],
            left: u.column(k).into_owned(),
        })
        .collect();
    Ok(SvdResult { pairs })
}

/// Jacobian, its spectrum and the resulting deficiency.
#[derive(Debug, Clone)]
pub struct RankAnalysis {
    pub jacobian: SparseJacobian,
    pub svd: SvdResult,
    /// Absolute ε after resolving the configured threshold.
    pub threshold: Real,
    pub deficiency: usize,
}

impl RankAnalysis {
    pub fn is_healthy(&self) -> bool {
        self.deficiency == 0
    }

    /// The `deficiency` pairs with the smallest singular values.
    pub fn near_null_pairs(&self) -> &[SingularPair] {
        let pairs = self.svd.pairs();
        &pairs[pairs.len() - self.deficiency..]
    }

    pub fn report(&self) -> RankReport {
        RankReport {
            rows: self.jacobian.nrows(),
            columns: self.jacobian.ncols(),
            threshold: self.threshold,
            deficiency: self.deficiency,
            singular_values: self.svd.values(),
        }
    }
}

/// Serializable summary of a rank analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankReport {
    pub rows: usize,
    pub columns: usize,
    pub threshold: Real,
    pub deficiency: usize,
    pub singular_values: Vec<Real>,
}

impl RankReport {
    /// Up to `n` smallest singular values, smallest first.
    pub fn smallest(&self, n: usize) -> Vec<Real> {
        self.singular_values.iter().rev().take(n).copied().collect()
    }
}

fn check_equalities(model: &dyn ModelAdapter, ids: &[ConId]) -> DiagnosticResult<()> {
    for &id in ids {
        let info = model
            .constraint_info(id)
            .ok_or(ModelError::UnknownConstraint(id))?;
        if !info.is_equality() {
            return Err(DiagnosticError::InvalidConstraintSet {
                what: format!("{} is an inequality", info.name),
            });
        }
    }
    Ok(())
}

/// Build the Jacobian of `ids` (all equalities when `None`) and count its
/// singular values below the resolved threshold.
pub fn analyze_rank(
    model: &dyn ModelAdapter,
    ids: Option<&[ConId]>,
    threshold: &SingularValueThreshold,
) -> DiagnosticResult<RankAnalysis> {
    threshold.validate()?;

    let ids = match ids {
        Some(ids) => {
            check_equalities(model, ids)?;
            ids.to_vec()
        }
        None => model.equality_constraints(),
    };

    let jacobian = model.jacobian(&ids)?;
    if jacobian.row_ids() != ids.as_slice() {
        return Err(DiagnosticError::DimensionMismatch {
            what: format!(
                "Jacobian rows do not follow the {} requested constraints",
                ids.len()
            ),
        });
    }

    let svd = decompose(&jacobian.to_dense())?;
    let eps = threshold.resolve(svd.sigma_max(), jacobian.nrows(), jacobian.ncols());
    let deficiency = svd.count_below(eps);

    debug!(
        rows = jacobian.nrows(),
        cols = jacobian.ncols(),
        nnz = jacobian.nnz(),
        sigma_max = svd.sigma_max(),
        threshold = eps,
        deficiency,
        "rank analysis"
    );

    Ok(RankAnalysis {
        jacobian,
        svd,
        threshold: eps,
        deficiency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dh_model::{ConstraintBounds, ModelBuilder};
    use nalgebra::dmatrix;

    #[test]
    fn spectrum_is_descending() {
        let m = dmatrix![1.0, 0.0; 0.0, 3.0; 0.0, 0.0];
        let svd = decompose(&m).unwrap();
        assert_eq!(svd.len(), 3);
        let values = svd.values();
        assert!((values[0] - 3.0).abs() < 1e-12);
        assert!((values[1] - 1.0).abs() < 1e-12);
        assert_eq!(svd.count_below(1e-10), 1);
    }

    #[test]
    fn left_vector_spans_row_dependency() {
        let m = dmatrix![1.0, 2.0; 2.0, 4.0];
        let svd = decompose(&m).unwrap();
        let null = &svd.pairs()[1];
        assert!(null.value < 1e-12);
        // u^T J = 0 for the left singular vector of a zero singular value
        let residual = null.left.transpose() * &m;
        assert!(residual.norm() < 1e-10);
        assert!((null.left[0].abs() - 2.0 / 5f64.sqrt()).abs() < 1e-8);
    }

    #[test]
    fn empty_jacobian_is_healthy() {
        let model = ModelBuilder::new().build().unwrap();
        let rank = analyze_rank(&model, None, &SingularValueThreshold::absolute(1e-8)).unwrap();
        assert!(rank.is_healthy());
        assert!(rank.near_null_pairs().is_empty());
    }

    #[test]
    fn fixed_only_row_is_deficient_under_relative_threshold() {
        let mut b = ModelBuilder::new();
        let p = b.add_variable("p", 1.0);
        b.fix(p);
        b.add_linear("c", &[(p, 1.0)], 0.0, ConstraintBounds::Equal(1.0));
        let model = b.build().unwrap();

        let rank = analyze_rank(&model, None, &SingularValueThreshold::relative(1e-6)).unwrap();
        assert_eq!(rank.jacobian.ncols(), 0);
        assert_eq!(rank.deficiency, 1);
    }

    #[test]
    fn tall_jacobian_counts_surplus_rows() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable("x", 0.0);
        for i in 0..3 {
            let coeff = 1.0 + i as f64;
            b.add_linear(format!("c{i}"), &[(x, coeff)], 0.0, ConstraintBounds::Equal(0.0));
        }
        let model = b.build().unwrap();

        let rank = analyze_rank(&model, None, &SingularValueThreshold::MachinePrecision).unwrap();
        assert_eq!(rank.svd.len(), 3);
        assert_eq!(rank.deficiency, 2);
        assert!(rank.report().smallest(2).iter().all(|s| s.abs() < 1e-12));
    }

    #[test]
    fn inequality_in_explicit_set_is_rejected() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable("x", 0.0);
        let c = b.add_linear("c", &[(x, 1.0)], 0.0, ConstraintBounds::AtLeast(0.0));
        let model = b.build().unwrap();

        let err = analyze_rank(&model, Some(&[c]), &SingularValueThreshold::absolute(1e-8));
        assert!(matches!(err, Err(DiagnosticError::InvalidConstraintSet { .. })));
    }
}
