//! Irreducible degenerate sets: for a seed equation c, the smallest set of
//! equations containing c whose Jacobian rows are linearly dependent.
//!
//! Each search is one MILP over the rows of the Jacobian under analysis:
//!
//! ```text
//! minimise    Σ z_j
//! subject to  -M z_j <= y_j <= M z_j        for every row j
//!             Σ_j y_j J[j, v] = 0           for every column v
//!             y_c = 1, z_c = 1
//!             z_j ∈ {0, 1}
//! ```
//!
//! Fixing `y_c = 1` excludes the zero multiplier vector; any dependency
//! involving c can be rescaled to meet it as long as the other multipliers
//! stay within `M`. Rows of J are scaled to unit norm first, so that bound
//! does not depend on how each equation happens to be scaled.

use dh_core::{ConId, Real};
use dh_model::SparseJacobian;
use dh_solver::{MilpInstance, MilpSolver, MilpStatus, RowSense};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::IdsConfig;
use crate::error::{DiagnosticError, DiagnosticResult, SolverStage};
use crate::verify::verify_irreducible;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IdsOutcome {
    /// Minimal set containing the seed, in Jacobian row order.
    Found {
        members: Vec<ConId>,
        /// SVD re-check of minimality, when requested.
        verified: Option<bool>,
    },
    /// The MILP is infeasible: no dependency involving the seed exists
    /// under the current thresholds.
    NoDegenerateSet,
    Failed { stage: SolverStage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdsResult {
    pub seed: ConId,
    #[serde(flatten)]
    pub outcome: IdsOutcome,
}

impl IdsResult {
    pub fn members(&self) -> Option<&[ConId]> {
        match &self.outcome {
            IdsOutcome::Found { members, .. } => Some(members),
            _ => None,
        }
    }

    /// The per-candidate failure as an error value.
    pub fn error(&self) -> Option<DiagnosticError> {
        match &self.outcome {
            IdsOutcome::Failed { stage, reason } => Some(DiagnosticError::SolverFailure {
                stage: *stage,
                what: format!("seed {}: {}", self.seed, reason),
            }),
            _ => None,
        }
    }
}

/// The MILP for one seed with the positions of its variables.
#[derive(Debug, Clone)]
pub struct IdsProblem {
    pub instance: MilpInstance,
    /// Selection binary of each Jacobian row.
    pub selectors: Vec<usize>,
    /// Multiplier of each Jacobian row.
    pub multipliers: Vec<usize>,
}

/// Nonzero entries of each column as (row, value), with every nonzero row
/// scaled to unit norm.
///
/// Row scaling leaves the set of dependent row subsets unchanged but keeps a
/// large seed row from pushing its partners' multipliers past `M`.
fn column_terms(jacobian: &SparseJacobian) -> Vec<Vec<(usize, Real)>> {
    let mut dense = jacobian.to_dense();
    for mut row in dense.row_iter_mut() {
        let norm = row.norm();
        if norm > 0.0 {
            row /= norm;
        }
    }
    dense
        .column_iter()
        .map(|col| {
            col.iter()
                .enumerate()
                .filter(|(_, v)| **v != 0.0)
                .map(|(row, &v)| (row, v))
                .collect()
        })
        .collect()
}

fn build_problem(
    columns: &[Vec<(usize, Real)>],
    nrows: usize,
    seed: usize,
    config: &IdsConfig,
) -> IdsProblem {
    let big_m = config.big_m;
    let mut instance = MilpInstance::new();
    let mut selectors = Vec::with_capacity(nrows);
    let mut multipliers = Vec::with_capacity(nrows);

    for row in 0..nrows {
        let (z_lo, y_lo, y_hi) = if row == seed {
            (1.0, 1.0, 1.0)
        } else {
            (0.0, -big_m, big_m)
        };
        let z = instance.add_binary(format!("z{row}"), z_lo, 1.0);
        let y = instance.add_continuous(format!("y{row}"), y_lo, y_hi);
        instance.add_row(vec![(y, 1.0), (z, -big_m)], RowSense::Le, 0.0);
        instance.add_row(vec![(y, 1.0), (z, big_m)], RowSense::Ge, 0.0);
        selectors.push(z);
        multipliers.push(y);
    }

    for terms in columns.iter().filter(|t| !t.is_empty()) {
        let coeffs: Vec<(usize, Real)> = terms
            .iter()
            .map(|&(row, value)| (multipliers[row], value))
            .collect();
        if config.null_space_tol > 0.0 {
            instance.add_row(coeffs.clone(), RowSense::Le, config.null_space_tol);
            instance.add_row(coeffs, RowSense::Ge, -config.null_space_tol);
        } else {
            instance.add_row(coeffs, RowSense::Eq, 0.0);
        }
    }

    instance.set_objective(selectors.iter().map(|&z| (z, 1.0)).collect());
    IdsProblem {
        instance,
        selectors,
        multipliers,
    }
}

/// Build the MILP that searches for the smallest degenerate set containing
/// `seed`.
pub fn build_ids_milp(
    jacobian: &SparseJacobian,
    seed: ConId,
    config: &IdsConfig,
) -> DiagnosticResult<IdsProblem> {
    config.validate()?;
    let pos = seed_position(jacobian, seed)?;
    Ok(build_problem(
        &column_terms(jacobian),
        jacobian.nrows(),
        pos,
        config,
    ))
}

fn seed_position(jacobian: &SparseJacobian, seed: ConId) -> DiagnosticResult<usize> {
    jacobian
        .row_position(seed)
        .ok_or_else(|| DiagnosticError::InvalidConstraintSet {
            what: format!("seed {seed} is not a Jacobian row"),
        })
}

struct IdsContext<'a> {
    jacobian: &'a SparseJacobian,
    columns: Vec<Vec<(usize, Real)>>,
    config: &'a IdsConfig,
    solver: &'a dyn MilpSolver,
    threshold: Real,
}

impl IdsContext<'_> {
    fn solve(&self, seed: ConId) -> IdsResult {
        let outcome = match seed_position(self.jacobian, seed) {
            Ok(pos) => self.solve_at(seed, pos),
            Err(err) => IdsOutcome::Failed {
                stage: SolverStage::Milp,
                reason: err.to_string(),
            },
        };
        IdsResult { seed, outcome }
    }

    fn solve_at(&self, seed: ConId, pos: usize) -> IdsOutcome {
        let rows = self.jacobian.row_ids();
        let problem = build_problem(&self.columns, rows.len(), pos, self.config);
        debug!(
            %seed,
            solver = self.solver.name(),
            vars = problem.instance.num_vars(),
            rows = problem.instance.num_rows(),
            "solving IDS MILP"
        );

        let outcome = self.solver.solve(&problem.instance);
        match outcome.status {
            MilpStatus::Optimal => {}
            MilpStatus::Infeasible => {
                warn!(%seed, "no degenerate set contains candidate");
                return IdsOutcome::NoDegenerateSet;
            }
            MilpStatus::Error(reason) => {
                warn!(%seed, %reason, "IDS MILP failed");
                return IdsOutcome::Failed {
                    stage: SolverStage::Milp,
                    reason,
                };
            }
        }

        let members: Vec<ConId> = problem
            .selectors
            .iter()
            .enumerate()
            .filter(|&(_, &z)| outcome.values.get(z).is_some_and(|&v| v > 0.5))
            .map(|(row, _)| rows[row])
            .collect();
        if !members.contains(&seed) {
            return IdsOutcome::Failed {
                stage: SolverStage::Milp,
                reason: "solution does not select the seed".to_string(),
            };
        }

        let verified = if self.config.verify {
            match verify_irreducible(self.jacobian, &members, self.threshold) {
                Ok(ok) => {
                    if !ok {
                        warn!(%seed, size = members.len(), "IDS failed the minimality check");
                    }
                    Some(ok)
                }
                Err(err) => {
                    return IdsOutcome::Failed {
                        stage: SolverStage::Svd,
                        reason: err.to_string(),
                    };
                }
            }
        } else {
            None
        };

        info!(%seed, size = members.len(), "irreducible degenerate set found");
        IdsOutcome::Found { members, verified }
    }
}

/// Solve the IDS MILP for a single seed.
///
/// `threshold` is the absolute singular value threshold used by the
/// minimality re-check.
pub fn solve_ids(
    jacobian: &SparseJacobian,
    seed: ConId,
    config: &IdsConfig,
    solver: &dyn MilpSolver,
    threshold: Real,
) -> DiagnosticResult<IdsResult> {
    config.validate()?;
    seed_position(jacobian, seed)?;
    let ctx = IdsContext {
        jacobian,
        columns: column_terms(jacobian),
        config,
        solver,
        threshold,
    };
    Ok(ctx.solve(seed))
}

/// One IDS search per seed. A failing seed never aborts the others.
pub fn find_irreducible_degenerate_sets(
    jacobian: &SparseJacobian,
    seeds: &[ConId],
    config: &IdsConfig,
    solver: &dyn MilpSolver,
    threshold: Real,
) -> DiagnosticResult<Vec<IdsResult>> {
    config.validate()?;
    let ctx = IdsContext {
        jacobian,
        columns: column_terms(jacobian),
        config,
        solver,
        threshold,
    };

    let results: Vec<IdsResult> = if config.parallel {
        seeds.par_iter().map(|&seed| ctx.solve(seed)).collect()
    } else {
        seeds.iter().map(|&seed| ctx.solve(seed)).collect()
    };

    let found = results.iter().filter(|r| r.members().is_some()).count();
    debug!(seeds = seeds.len(), found, parallel = config.parallel, "IDS search");
    Ok(results)
}

/// Distinct member sets among the results, in first-seen order.
pub fn distinct_sets(results: &[IdsResult]) -> Vec<Vec<ConId>> {
    let mut sets: Vec<Vec<ConId>> = Vec::new();
    for members in results.iter().filter_map(IdsResult::members) {
        if !sets.iter().any(|s| s.as_slice() == members) {
            sets.push(members.to_vec());
        }
    }
    sets
}
