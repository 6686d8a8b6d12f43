//! Diagnosis execution and caching service.

use std::path::Path;
use std::time::Instant;

use dh_diagnostics::{
    AnalysisState, BoundCheckOptions, BoundViolation, DegeneracyHunter, DegeneracyReport,
    DiagnosticConfig, DiagnosticError, IdsConfig, RankReport, ResidualViolation,
    SingularValueThreshold, SolverStage, analyze_rank, check_residuals, check_variable_bounds,
    config::DEFAULT_CHECK_TOL,
};
use dh_model::{AlgebraicModel, AnalysisDef, Snapshot, ThresholdDef};
use dh_solver::{GaussNewtonSolver, MicroLpSolver, MilpOptions, NlpOptions, NlpOutcome, NlpSolver};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::progress::{DiagnoseProgressEvent, DiagnoseStage};
use crate::report_store::{ReportManifest, ReportStore, compute_report_id};
use crate::snapshot_service;

/// Command-line or UI values that take precedence over the snapshot's
/// `analysis` block.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOverrides {
    pub residual_tol: Option<f64>,
    pub bound_tol: Option<f64>,
    pub relative_bounds: bool,
    pub skip_lower: bool,
    pub skip_upper: bool,
    pub singular_value_threshold: Option<SingularValueThreshold>,
    pub candidate_tol: Option<f64>,
    pub big_m: Option<f64>,
    pub null_space_tol: Option<f64>,
    pub parallel: bool,
}

fn threshold_from_def(def: ThresholdDef) -> SingularValueThreshold {
    match def {
        ThresholdDef::Absolute { value } => SingularValueThreshold::Absolute { value },
        ThresholdDef::Relative { value } => SingularValueThreshold::Relative { value },
        ThresholdDef::MachinePrecision => SingularValueThreshold::MachinePrecision,
    }
}

fn required<T>(value: Option<T>, name: &str, flag: &str) -> AppResult<T> {
    value.ok_or_else(|| {
        AppError::InvalidInput(format!(
            "{name} is required: pass {flag} or set analysis.{name} in the snapshot"
        ))
    })
}

fn bound_options(analysis: &AnalysisDef, overrides: &AnalysisOverrides) -> BoundCheckOptions {
    BoundCheckOptions {
        tol: overrides
            .bound_tol
            .or(analysis.bound_tol)
            .unwrap_or(DEFAULT_CHECK_TOL),
        relative: overrides.relative_bounds,
        skip_lower: overrides.skip_lower,
        skip_upper: overrides.skip_upper,
    }
}

fn threshold(
    analysis: &AnalysisDef,
    overrides: &AnalysisOverrides,
) -> AppResult<SingularValueThreshold> {
    required(
        overrides
            .singular_value_threshold
            .or(analysis.singular_value_threshold.map(threshold_from_def)),
        "singular_value_threshold",
        "--svd-abs, --svd-rel or --svd-machine",
    )
}

/// Merge the snapshot's analysis block with the overrides.
///
/// The singular value threshold, the candidate threshold and big-M must come
/// from one of the two; they have no defaults.
pub fn resolve_config(
    analysis: Option<&AnalysisDef>,
    overrides: &AnalysisOverrides,
) -> AppResult<DiagnosticConfig> {
    let defaults = AnalysisDef::default();
    let analysis = analysis.unwrap_or(&defaults);

    let config = DiagnosticConfig {
        residual_tol: overrides
            .residual_tol
            .or(analysis.residual_tol)
            .unwrap_or(DEFAULT_CHECK_TOL),
        bounds: bound_options(analysis, overrides),
        singular_value_threshold: threshold(analysis, overrides)?,
        candidate_tol: required(
            overrides.candidate_tol.or(analysis.candidate_tol),
            "candidate_tol",
            "--candidate-tol",
        )?,
        ids: IdsConfig {
            big_m: required(overrides.big_m.or(analysis.big_m), "big_m", "--big-m")?,
            null_space_tol: overrides
                .null_space_tol
                .or(analysis.null_space_tol)
                .unwrap_or(0.0),
            parallel: overrides.parallel,
            verify: true,
        },
    };
    config.validate()?;
    Ok(config)
}

/// Options for a diagnosis run.
#[derive(Debug, Clone)]
pub struct DiagnoseOptions {
    pub use_cache: bool,
    pub tool_version: String,
    /// Options for establishing the point; zero iterations analyses the
    /// snapshot's point as given.
    pub nlp: NlpOptions,
    pub milp: MilpOptions,
}

impl Default for DiagnoseOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            nlp: NlpOptions::evaluate_only(),
            milp: MilpOptions::default(),
        }
    }
}

/// Request to diagnose one snapshot.
pub struct DiagnoseRequest<'a> {
    pub snapshot_path: &'a Path,
    pub overrides: AnalysisOverrides,
    pub options: DiagnoseOptions,
}

/// Response from a diagnosis.
#[derive(Debug, Clone)]
pub struct DiagnoseResponse {
    pub report_id: String,
    pub manifest: ReportManifest,
    pub report: DegeneracyReport,
    pub loaded_from_cache: bool,
    /// Present when the point was established in this call.
    pub nlp: Option<NlpOutcome>,
    pub total_time_s: f64,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(DiagnoseProgressEvent)>,
    stage: DiagnoseStage,
    started: Instant,
    message: Option<String>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(DiagnoseProgressEvent::stage(
            stage,
            started.elapsed().as_secs_f64(),
            message,
        ));
    }
}

fn point_key(nlp: &NlpOptions) -> String {
    if nlp.max_iterations == 0 {
        "point=given".to_string()
    } else {
        format!(
            "point=gauss-newton;iters={};tol={:e};beta={};ls={}",
            nlp.max_iterations, nlp.abs_tol, nlp.line_search_beta, nlp.max_line_search_iters
        )
    }
}

/// Run the NLP collaborator on the model. Zero iterations only evaluates.
fn establish_point(model: &mut AlgebraicModel, nlp: &NlpOptions) -> AppResult<NlpOutcome> {
    let outcome = GaussNewtonSolver::new().solve(model, nlp)?;
    if outcome.status.is_usable() {
        return Ok(outcome);
    }
    Err(AppError::Diagnostic(DiagnosticError::SolverFailure {
        stage: SolverStage::Nlp,
        what: format!(
            "{:?} after {} iterations, residual norm {:e}",
            outcome.status, outcome.iterations, outcome.residual_norm
        ),
    }))
}

/// Execute or load a diagnosis.
pub fn ensure_diagnosis(request: &DiagnoseRequest) -> AppResult<DiagnoseResponse> {
    ensure_diagnosis_with_progress(request, None)
}

/// Execute or load a diagnosis and stream progress events.
pub fn ensure_diagnosis_with_progress(
    request: &DiagnoseRequest,
    mut progress_cb: Option<&mut dyn FnMut(DiagnoseProgressEvent)>,
) -> AppResult<DiagnoseResponse> {
    let started = Instant::now();

    emit_progress(
        &mut progress_cb,
        DiagnoseStage::LoadingSnapshot,
        started,
        Some("Loading snapshot".to_string()),
    );
    let snapshot = snapshot_service::load_snapshot(request.snapshot_path)?;
    let config = resolve_config(snapshot.analysis.as_ref(), &request.overrides)?;

    emit_progress(
        &mut progress_cb,
        DiagnoseStage::CheckingCache,
        started,
        Some("Checking report cache".to_string()),
    );
    let report_id = compute_report_id(
        &snapshot,
        &config,
        &point_key(&request.options.nlp),
        &request.options.tool_version,
    );
    let store = ReportStore::for_snapshot(request.snapshot_path)?;

    if request.options.use_cache && store.has_report(&report_id) {
        emit_progress(
            &mut progress_cb,
            DiagnoseStage::LoadingCachedReport,
            started,
            Some("Loading cached report".to_string()),
        );
        let manifest = store.load_manifest(&report_id)?;
        let report = store.load_report(&report_id)?;
        debug!(%report_id, "loaded cached report");

        emit_progress(
            &mut progress_cb,
            DiagnoseStage::Completed,
            started,
            Some("Loaded cached report".to_string()),
        );
        return Ok(DiagnoseResponse {
            report_id,
            manifest,
            report,
            loaded_from_cache: true,
            nlp: None,
            total_time_s: started.elapsed().as_secs_f64(),
        });
    }

    let (report, nlp) = execute_diagnosis(
        &snapshot,
        config,
        &request.options,
        &mut progress_cb,
        started,
    )?;

    emit_progress(
        &mut progress_cb,
        DiagnoseStage::SavingReport,
        started,
        Some("Saving report".to_string()),
    );
    let manifest = ReportManifest::for_report(
        &report_id,
        &snapshot.name,
        &request.options.tool_version,
        &report,
    );
    store.save_report(&manifest, &report)?;

    info!(
        %report_id,
        state = ?report.state,
        deficiency = report.rank.deficiency,
        "diagnosis complete"
    );
    emit_progress(
        &mut progress_cb,
        DiagnoseStage::Completed,
        started,
        Some("Diagnosis completed".to_string()),
    );

    Ok(DiagnoseResponse {
        report_id,
        manifest,
        report,
        loaded_from_cache: false,
        nlp,
        total_time_s: started.elapsed().as_secs_f64(),
    })
}

fn execute_diagnosis(
    snapshot: &Snapshot,
    config: DiagnosticConfig,
    options: &DiagnoseOptions,
    progress_cb: &mut Option<&mut dyn FnMut(DiagnoseProgressEvent)>,
    started: Instant,
) -> AppResult<(DegeneracyReport, Option<NlpOutcome>)> {
    let mut model = snapshot_service::compile_snapshot(snapshot)?;

    let nlp = if options.nlp.max_iterations > 0 {
        emit_progress(
            progress_cb,
            DiagnoseStage::EstablishingPoint,
            started,
            Some(format!(
                "Establishing point (up to {} iterations)",
                options.nlp.max_iterations
            )),
        );
        Some(establish_point(&mut model, &options.nlp)?)
    } else {
        None
    };

    let hunter = DegeneracyHunter::new(&model, config)?;
    let solver = MicroLpSolver::with_options(options.milp);
    let mut observe = |state: AnalysisState| {
        emit_progress(
            progress_cb,
            DiagnoseStage::Analysis(state),
            started,
            None,
        );
    };
    let report = hunter.run_with_observer(&solver, &mut observe)?;
    Ok((report, nlp))
}

/// Residual check on a snapshot's point.
pub fn residual_report(
    snapshot_path: &Path,
    overrides: &AnalysisOverrides,
) -> AppResult<Vec<ResidualViolation>> {
    let snapshot = snapshot_service::load_snapshot(snapshot_path)?;
    let model = snapshot_service::compile_snapshot(&snapshot)?;
    let defaults = AnalysisDef::default();
    let analysis = snapshot.analysis.as_ref().unwrap_or(&defaults);
    let tol = overrides
        .residual_tol
        .or(analysis.residual_tol)
        .unwrap_or(DEFAULT_CHECK_TOL);
    Ok(check_residuals(&model, tol)?)
}

/// Bound check on a snapshot's point.
pub fn bound_report(
    snapshot_path: &Path,
    overrides: &AnalysisOverrides,
) -> AppResult<Vec<BoundViolation>> {
    let snapshot = snapshot_service::load_snapshot(snapshot_path)?;
    let model = snapshot_service::compile_snapshot(&snapshot)?;
    let defaults = AnalysisDef::default();
    let analysis = snapshot.analysis.as_ref().unwrap_or(&defaults);
    Ok(check_variable_bounds(
        &model,
        &bound_options(analysis, overrides),
    )?)
}

/// Rank analysis of all equality constraints at a snapshot's point.
pub fn rank_report(snapshot_path: &Path, overrides: &AnalysisOverrides) -> AppResult<RankReport> {
    let snapshot = snapshot_service::load_snapshot(snapshot_path)?;
    let model = snapshot_service::compile_snapshot(&snapshot)?;
    let defaults = AnalysisDef::default();
    let analysis = snapshot.analysis.as_ref().unwrap_or(&defaults);
    let threshold = threshold(analysis, overrides)?;
    Ok(analyze_rank(&model, None, &threshold)?.report())
}

/// Stored reports for a snapshot, most recent first.
pub fn list_reports(snapshot_path: &Path) -> AppResult<Vec<ReportManifest>> {
    ReportStore::for_snapshot(snapshot_path)?.list_reports()
}

/// Load a stored report.
pub fn load_report(
    snapshot_path: &Path,
    report_id: &str,
) -> AppResult<(ReportManifest, DegeneracyReport)> {
    let store = ReportStore::for_snapshot(snapshot_path)?;
    let manifest = store.load_manifest(report_id)?;
    let report = store.load_report(report_id)?;
    Ok((manifest, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_the_snapshot() {
        let analysis = AnalysisDef {
            singular_value_threshold: Some(ThresholdDef::Relative { value: 1e-9 }),
            candidate_tol: Some(1e-4),
            big_m: Some(10.0),
            ..AnalysisDef::default()
        };
        let overrides = AnalysisOverrides {
            big_m: Some(500.0),
            residual_tol: Some(1e-3),
            ..AnalysisOverrides::default()
        };
        let config = resolve_config(Some(&analysis), &overrides).unwrap();
        assert_eq!(config.ids.big_m, 500.0);
        assert_eq!(config.candidate_tol, 1e-4);
        assert_eq!(config.residual_tol, 1e-3);
        assert_eq!(config.bounds.tol, DEFAULT_CHECK_TOL);
        assert_eq!(
            config.singular_value_threshold,
            SingularValueThreshold::relative(1e-9)
        );
    }

    #[test]
    fn missing_threshold_is_reported() {
        let overrides = AnalysisOverrides {
            candidate_tol: Some(1e-4),
            big_m: Some(10.0),
            ..AnalysisOverrides::default()
        };
        let err = resolve_config(None, &overrides).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(msg) if msg.contains("singular_value_threshold")));
    }

    #[test]
    fn invalid_tolerance_surfaces_as_diagnostic_error() {
        let overrides = AnalysisOverrides {
            singular_value_threshold: Some(SingularValueThreshold::absolute(1e-8)),
            candidate_tol: Some(-1.0),
            big_m: Some(10.0),
            ..AnalysisOverrides::default()
        };
        let err = resolve_config(None, &overrides).unwrap_err();
        assert!(matches!(
            err,
            AppError::Diagnostic(DiagnosticError::InvalidTolerance { .. })
        ));
    }

    #[test]
    fn point_key_distinguishes_nlp_runs() {
        assert_eq!(point_key(&NlpOptions::evaluate_only()), "point=given");
        assert_ne!(point_key(&NlpOptions::default()), "point=given");
    }
}
