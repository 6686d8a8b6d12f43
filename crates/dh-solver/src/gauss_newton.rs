//! Gauss-Newton solver for equality systems with bound projection.

use dh_core::{ConId, Real, VarId};
use dh_model::PointModel;
use nalgebra::DVector;
use tracing::debug;

use crate::error::{SolverError, SolverResult};
use crate::nlp::{NlpOptions, NlpOutcome, NlpSolver, NlpStatus};

/// Drives the equality residuals toward zero over the free variables.
///
/// Steps are least-squares solutions of `J dx = -r` (via SVD, so non-square
/// and rank-deficient systems are fine), shortened by backtracking until the
/// residual norm decreases, and projected onto the variable bounds.
/// Inequalities are not enforced.
#[derive(Debug, Clone, Default)]
pub struct GaussNewtonSolver;

impl GaussNewtonSolver {
    pub fn new() -> Self {
        Self
    }
}

fn residual_vector(model: &dyn PointModel, rows: &[ConId]) -> SolverResult<DVector<Real>> {
    let values = rows
        .iter()
        .map(|&id| model.residual(id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DVector::from_vec(values))
}

fn current_point(model: &dyn PointModel, cols: &[VarId]) -> SolverResult<Vec<Real>> {
    Ok(cols
        .iter()
        .map(|&id| model.value(id))
        .collect::<Result<Vec<_>, _>>()?)
}

fn set_point(model: &mut dyn PointModel, cols: &[VarId], x: &[Real]) -> SolverResult<()> {
    for (&id, &value) in cols.iter().zip(x) {
        model.set_value(id, value)?;
    }
    Ok(())
}

fn project(model: &dyn PointModel, id: VarId, value: Real) -> Real {
    let Some(info) = model.variable_info(id) else {
        return value;
    };
    let mut v = value;
    if let Some(lo) = info.lower {
        v = v.max(lo);
    }
    if let Some(hi) = info.upper {
        v = v.min(hi);
    }
    v
}

fn outcome(
    model: &dyn PointModel,
    status: NlpStatus,
    iterations: usize,
    residual_norm: Real,
) -> SolverResult<NlpOutcome> {
    let point = model
        .list_variables()
        .iter()
        .filter(|v| !v.fixed)
        .map(|v| Ok((v.id, model.value(v.id)?)))
        .collect::<SolverResult<Vec<_>>>()?;
    Ok(NlpOutcome {
        status,
        iterations,
        residual_norm,
        point,
    })
}

impl NlpSolver for GaussNewtonSolver {
    fn solve(&self, model: &mut dyn PointModel, options: &NlpOptions) -> SolverResult<NlpOutcome> {
        if !(options.line_search_beta > 0.0 && options.line_search_beta < 1.0) {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "line_search_beta must lie in (0, 1), got {}",
                    options.line_search_beta
                ),
            });
        }

        let rows = model.equality_constraints();
        let mut r = residual_vector(model, &rows)?;
        let mut r_norm = r.norm();

        if options.max_iterations == 0 {
            return outcome(model, NlpStatus::Evaluated, 0, r_norm);
        }

        for iter in 0..options.max_iterations {
            // Check convergence
            if r_norm < options.abs_tol {
                debug!(iterations = iter, residual_norm = r_norm, "Gauss-Newton converged");
                return outcome(model, NlpStatus::Converged, iter, r_norm);
            }

            let jac = model.jacobian(&rows)?;
            let cols = jac.col_ids().to_vec();
            if cols.is_empty() {
                return outcome(model, NlpStatus::Failed, iter, r_norm);
            }

            // Least-squares step: J * dx = -r
            let svd = jac.to_dense().svd(true, true);
            let dx = svd
                .solve(&(-&r), 1e-14)
                .map_err(|what| SolverError::Numeric {
                    what: format!("least-squares step failed: {what}"),
                })?;

            let x0 = current_point(model, &cols)?;
            let mut alpha = 1.0;
            let mut accepted = false;

            for _ in 0..=options.max_line_search_iters {
                let trial: Vec<Real> = cols
                    .iter()
                    .enumerate()
                    .map(|(j, &id)| project(model, id, x0[j] + alpha * dx[j]))
                    .collect();
                set_point(model, &cols, &trial)?;

                let r_new = residual_vector(model, &rows)?;
                let r_new_norm = r_new.norm();
                if r_new_norm < r_norm {
                    r = r_new;
                    r_norm = r_new_norm;
                    accepted = true;
                    break;
                }

                // Backtrack
                alpha *= options.line_search_beta;
            }

            if !accepted {
                set_point(model, &cols, &x0)?;
                debug!(iteration = iter, residual_norm = r_norm, "line search stagnated");
                return outcome(model, NlpStatus::Failed, iter, r_norm);
            }
        }

        if r_norm < options.abs_tol {
            return outcome(model, NlpStatus::Converged, options.max_iterations, r_norm);
        }
        outcome(model, NlpStatus::IterationLimit, options.max_iterations, r_norm)
    }
}
