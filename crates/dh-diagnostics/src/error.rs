//! Error types for degeneracy diagnosis.

use dh_core::tolerance_defect;
use dh_model::ModelError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which external or numerical step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStage {
    Nlp,
    Svd,
    Milp,
}

impl std::fmt::Display for SolverStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverStage::Nlp => write!(f, "nlp"),
            SolverStage::Svd => write!(f, "svd"),
            SolverStage::Milp => write!(f, "milp"),
        }
    }
}

#[derive(Error, Debug)]
pub enum DiagnosticError {
    #[error("Invalid tolerance {what} = {value}: {reason}")]
    InvalidTolerance {
        what: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Dimension mismatch: {what}")]
    DimensionMismatch { what: String },

    #[error("Solver failure during {stage}: {what}")]
    SolverFailure { stage: SolverStage, what: String },

    #[error("Invalid constraint set: {what}")]
    InvalidConstraintSet { what: String },

    #[error("Model error: {0}")]
    Model(ModelError),
}

pub type DiagnosticResult<T> = Result<T, DiagnosticError>;

impl From<ModelError> for DiagnosticError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::DimensionMismatch { what } => DiagnosticError::DimensionMismatch { what },
            other => DiagnosticError::Model(other),
        }
    }
}

/// Reject negative or non-finite tolerances before any computation.
pub(crate) fn check_tolerance(what: &'static str, value: f64) -> DiagnosticResult<f64> {
    match tolerance_defect(value) {
        Some(reason) => Err(DiagnosticError::InvalidTolerance {
            what,
            value,
            reason,
        }),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_is_lifted() {
        let err: DiagnosticError = ModelError::DimensionMismatch {
            what: "x".to_string(),
        }
        .into();
        assert!(matches!(err, DiagnosticError::DimensionMismatch { .. }));
    }

    #[test]
    fn tolerance_checks() {
        assert!(check_tolerance("tau", -0.1).is_err());
        assert!(check_tolerance("tau", f64::NAN).is_err());
        assert_eq!(check_tolerance("tau", 0.0).unwrap(), 0.0);
    }
}
