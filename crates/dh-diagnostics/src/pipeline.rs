//! The full diagnostic run as a state machine.
//!
//! ```text
//! Start -> ResidualsChecked -> RankChecked -> Healthy
//!                                          -> CandidatesFound -> IdsComputed
//! ```
//!
//! Pipeline-level errors (bad tolerances, dimension mismatch, SVD failure)
//! abort the run. Per-candidate MILP failures are recorded in the report
//! and the remaining candidates are still solved.

use dh_core::{ConId, Real};
use dh_model::ModelAdapter;
use dh_solver::MilpSolver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bounds::{BoundViolation, check_variable_bounds};
use crate::candidates::{CandidateSet, find_candidate_equations};
use crate::config::DiagnosticConfig;
use crate::degenerate_sets::{IdsResult, distinct_sets, find_irreducible_degenerate_sets};
use crate::error::{DiagnosticError, DiagnosticResult};
use crate::rank::{RankAnalysis, RankReport, analyze_rank};
use crate::residuals::{ResidualViolation, check_residuals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    Start,
    ResidualsChecked,
    RankChecked,
    /// Deficiency 0; terminal.
    Healthy,
    CandidatesFound,
    /// One IDS outcome per candidate; terminal.
    IdsComputed,
}

impl AnalysisState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisState::Healthy | AnalysisState::IdsComputed)
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegeneracyReport {
    pub state: AnalysisState,
    pub config: DiagnosticConfig,
    pub residual_violations: Vec<ResidualViolation>,
    pub bound_violations: Vec<BoundViolation>,
    pub rank: RankReport,
    pub candidates: CandidateSet,
    pub degenerate_sets: Vec<IdsResult>,
    pub distinct_sets: Vec<Vec<ConId>>,
    /// Constraint names keyed by id, in declaration order, for rendering.
    pub constraint_names: Vec<(ConId, String)>,
}

impl DegeneracyReport {
    pub fn is_healthy(&self) -> bool {
        self.state == AnalysisState::Healthy
    }

    pub fn constraint_name(&self, id: ConId) -> &str {
        self.constraint_names
            .iter()
            .find(|(cid, _)| *cid == id)
            .map_or("?", |(_, name)| name.as_str())
    }

    /// Per-candidate solver failures.
    pub fn failures(&self) -> Vec<DiagnosticError> {
        self.degenerate_sets
            .iter()
            .filter_map(IdsResult::error)
            .collect()
    }

    pub fn ids_for(&self, seed: ConId) -> Option<&IdsResult> {
        self.degenerate_sets.iter().find(|r| r.seed == seed)
    }
}

/// Runs the diagnostic stages against one model at its current point.
///
/// The model is only read. The configuration is validated up front so that
/// an invalid tolerance never yields partial results.
pub struct DegeneracyHunter<'a> {
    model: &'a dyn ModelAdapter,
    config: DiagnosticConfig,
}

impl<'a> DegeneracyHunter<'a> {
    pub fn new(model: &'a dyn ModelAdapter, config: DiagnosticConfig) -> DiagnosticResult<Self> {
        config.validate()?;
        Ok(Self { model, config })
    }

    pub fn config(&self) -> &DiagnosticConfig {
        &self.config
    }

    pub fn check_residuals(&self) -> DiagnosticResult<Vec<ResidualViolation>> {
        check_residuals(self.model, self.config.residual_tol)
    }

    pub fn check_variable_bounds(&self) -> DiagnosticResult<Vec<BoundViolation>> {
        check_variable_bounds(self.model, &self.config.bounds)
    }

    /// Rank analysis over all equality constraints.
    pub fn check_rank(&self) -> DiagnosticResult<RankAnalysis> {
        analyze_rank(self.model, None, &self.config.singular_value_threshold)
    }

    /// Rank analysis over a chosen subset of equality constraints.
    pub fn check_rank_of(&self, ids: &[ConId]) -> DiagnosticResult<RankAnalysis> {
        analyze_rank(self.model, Some(ids), &self.config.singular_value_threshold)
    }

    pub fn find_candidates(&self, rank: &RankAnalysis) -> DiagnosticResult<CandidateSet> {
        find_candidate_equations(rank, self.config.candidate_tol)
    }

    pub fn find_degenerate_sets(
        &self,
        rank: &RankAnalysis,
        candidates: &CandidateSet,
        solver: &dyn MilpSolver,
    ) -> DiagnosticResult<Vec<IdsResult>> {
        find_irreducible_degenerate_sets(
            &rank.jacobian,
            &candidates.constraints,
            &self.config.ids,
            solver,
            rank.threshold,
        )
    }

    pub fn run(&self, solver: &dyn MilpSolver) -> DiagnosticResult<DegeneracyReport> {
        self.run_with_observer(solver, &mut |_| {})
    }

    /// Run every stage, reporting each state as it is entered.
    pub fn run_with_observer(
        &self,
        solver: &dyn MilpSolver,
        observer: &mut dyn FnMut(AnalysisState),
    ) -> DiagnosticResult<DegeneracyReport> {
        observer(AnalysisState::Start);

        let residual_violations = self.check_residuals()?;
        let bound_violations = self.check_variable_bounds()?;
        observer(AnalysisState::ResidualsChecked);

        let rank = self.check_rank()?;
        observer(AnalysisState::RankChecked);

        let mut report = DegeneracyReport {
            state: AnalysisState::RankChecked,
            config: self.config,
            residual_violations,
            bound_violations,
            rank: rank.report(),
            candidates: CandidateSet::default(),
            degenerate_sets: Vec::new(),
            distinct_sets: Vec::new(),
            constraint_names: self
                .model
                .list_constraints()
                .iter()
                .map(|c| (c.id, c.name.clone()))
                .collect(),
        };

        if rank.is_healthy() {
            info!(
                equalities = rank.jacobian.nrows(),
                "equality Jacobian has full rank"
            );
            report.state = AnalysisState::Healthy;
            observer(AnalysisState::Healthy);
            return Ok(report);
        }

        info!(deficiency = rank.deficiency, "equality Jacobian is rank deficient");
        report.candidates = self.find_candidates(&rank)?;
        report.state = AnalysisState::CandidatesFound;
        observer(AnalysisState::CandidatesFound);

        report.degenerate_sets = self.find_degenerate_sets(&rank, &report.candidates, solver)?;
        report.distinct_sets = distinct_sets(&report.degenerate_sets);
        let failed = report.failures().len();
        if failed > 0 {
            warn!(failed, "some IDS searches failed");
        }
        debug!(
            candidates = report.candidates.len(),
            distinct = report.distinct_sets.len(),
            "IDS stage complete"
        );
        report.state = AnalysisState::IdsComputed;
        observer(AnalysisState::IdsComputed);
        Ok(report)
    }
}

/// Largest residual magnitude in a report, 0 when none were flagged.
pub fn worst_residual(report: &DegeneracyReport) -> Real {
    report
        .residual_violations
        .iter()
        .map(|v| v.residual.abs())
        .fold(0.0, Real::max)
}
