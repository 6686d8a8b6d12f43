//! Degeneracy diagnosis for nonlinear programs at a given point.
//!
//! The pipeline runs, in order:
//! 1. residual and variable-bound checks (`residuals`, `bounds`)
//! 2. SVD rank analysis of the equality-constraint Jacobian (`rank`)
//! 3. extraction of candidate equations from near-null left singular
//!    vectors (`candidates`)
//! 4. one MILP per candidate to find a minimum-cardinality linearly
//!    dependent set of equations containing it (`degenerate_sets`)
//!
//! `DegeneracyHunter` strings the stages together; every stage is also
//! usable on its own.

pub mod bounds;
pub mod candidates;
pub mod config;
pub mod degenerate_sets;
pub mod error;
pub mod pipeline;
pub mod rank;
pub mod residuals;
pub mod verify;

pub use bounds::{BoundSide, BoundViolation, check_variable_bounds};
pub use candidates::{CandidateSet, find_candidate_equations};
pub use config::{BoundCheckOptions, DiagnosticConfig, IdsConfig, SingularValueThreshold};
pub use degenerate_sets::{
    IdsOutcome, IdsProblem, IdsResult, build_ids_milp, distinct_sets,
    find_irreducible_degenerate_sets, solve_ids,
};
pub use error::{DiagnosticError, DiagnosticResult, SolverStage};
pub use pipeline::{AnalysisState, DegeneracyHunter, DegeneracyReport, worst_residual};
pub use rank::{RankAnalysis, RankReport, SingularPair, SvdResult, analyze_rank, decompose};
pub use residuals::{ResidualViolation, check_residuals};
pub use verify::{row_deficiency, verify_irreducible};
