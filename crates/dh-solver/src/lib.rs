//! Solver collaborators for degeneracy analysis.
//!
//! - `milp`: solver-neutral mixed-integer linear program description and the
//!   `MilpSolver` seam, with a pure-Rust `microlp` backend via `good_lp`.
//! - `nlp`: the `NlpSolver` seam used to establish the point under analysis,
//!   with a Gauss-Newton implementation for equality systems.

pub mod error;
pub mod gauss_newton;
pub mod microlp;
pub mod milp;
pub mod nlp;

pub use error::{SolverError, SolverResult};
pub use gauss_newton::GaussNewtonSolver;
pub use microlp::MicroLpSolver;
pub use milp::{
    LinearRow, MilpInstance, MilpOptions, MilpOutcome, MilpSolver, MilpStatus, MilpVar, RowSense,
    VarKind,
};
pub use nlp::{NlpOptions, NlpOutcome, NlpSolver, NlpStatus};
