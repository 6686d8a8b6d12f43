//! Interface for establishing the point under analysis.

use dh_core::{Real, VarId};
use dh_model::PointModel;

use crate::error::SolverResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NlpStatus {
    /// Residual norm fell below tolerance.
    Converged,
    /// Zero iterations requested; the supplied point was only evaluated.
    Evaluated,
    /// Ran out of iterations before converging.
    IterationLimit,
    /// The method could not make progress.
    Failed,
}

impl NlpStatus {
    /// Whether the point can be trusted for analysis.
    pub fn is_usable(self) -> bool {
        matches!(self, NlpStatus::Converged | NlpStatus::Evaluated)
    }
}

/// NLP solver configuration, passed explicitly to every solve.
#[derive(Debug, Clone, Copy)]
pub struct NlpOptions {
    /// Maximum iterations (0 = evaluate at the supplied point)
    pub max_iterations: usize,
    /// Absolute tolerance for the equality residual norm
    pub abs_tol: f64,
    /// Line search backtracking factor
    pub line_search_beta: f64,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
}

impl Default for NlpOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-8,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
        }
    }
}

impl NlpOptions {
    /// Options that evaluate the model without moving the point.
    pub fn evaluate_only() -> Self {
        Self {
            max_iterations: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NlpOutcome {
    pub status: NlpStatus,
    pub iterations: usize,
    /// Euclidean norm of the equality residuals at the final point
    pub residual_norm: Real,
    /// Final values of the variables the solver was allowed to move
    pub point: Vec<(VarId, Real)>,
}

/// A blocking NLP backend that leaves its final point in the model.
pub trait NlpSolver {
    fn solve(&self, model: &mut dyn PointModel, options: &NlpOptions) -> SolverResult<NlpOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_converged_or_evaluated_points_are_usable() {
        assert!(NlpStatus::Converged.is_usable());
        assert!(NlpStatus::Evaluated.is_usable());
        assert!(!NlpStatus::IterationLimit.is_usable());
        assert!(!NlpStatus::Failed.is_usable());
    }
}
