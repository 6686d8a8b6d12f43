use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dh_app::{
    AnalysisOverrides, AppError, DiagnoseOptions, DiagnoseProgressEvent, DiagnoseRequest,
    DiagnoseStage, ensure_diagnosis, ensure_diagnosis_with_progress, list_reports, load_report,
};
use dh_diagnostics::{AnalysisState, DiagnosticError, SolverStage};
use dh_solver::NlpOptions;

static TEST_SNAPSHOT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Copy a demo snapshot into its own temporary directory so report stores
/// never collide between tests.
fn prepare_snapshot(name: &str) -> PathBuf {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name);
    let sequence = TEST_SNAPSHOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "dh_app_diagnose_smoke_{}_{}",
        std::process::id(),
        sequence
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let dest = dir.join(name);
    std::fs::copy(&source, &dest).expect("copy demo snapshot");
    dest
}

fn request(path: &Path) -> DiagnoseRequest<'_> {
    DiagnoseRequest {
        snapshot_path: path,
        overrides: AnalysisOverrides::default(),
        options: DiagnoseOptions::default(),
    }
}

#[test]
fn duplicate_equality_report_is_cached() {
    let path = prepare_snapshot("scenario_a.yaml");

    let mut events: Vec<DiagnoseProgressEvent> = Vec::new();
    let first = ensure_diagnosis_with_progress(&request(&path), Some(&mut |e| events.push(e)))
        .expect("diagnosis should succeed");

    assert!(!first.loaded_from_cache);
    assert_eq!(first.report.rank.deficiency, 1);
    assert_eq!(first.report.distinct_sets.len(), 1);
    assert_eq!(first.manifest.state, AnalysisState::IdsComputed);
    assert!(
        events
            .iter()
            .any(|e| e.stage == DiagnoseStage::Analysis(AnalysisState::CandidatesFound))
    );
    assert_eq!(events.last().map(|e| e.stage), Some(DiagnoseStage::Completed));

    let second = ensure_diagnosis(&request(&path)).expect("cached diagnosis");
    assert!(second.loaded_from_cache);
    assert_eq!(second.report_id, first.report_id);
    assert_eq!(second.report.distinct_sets, first.report.distinct_sets);

    let reports = list_reports(&path).unwrap();
    assert_eq!(reports.len(), 1);
    let (manifest, report) = load_report(&path, &first.report_id).unwrap();
    assert_eq!(manifest.snapshot_name, "scenario-a");
    let names: Vec<&str> = report.distinct_sets[0]
        .iter()
        .map(|&id| report.constraint_name(id))
        .collect();
    assert_eq!(names, vec!["c2", "c5"]);
}

#[test]
fn healthy_snapshot_stops_at_rank_check() {
    let path = prepare_snapshot("scenario_b.yaml");
    let response = ensure_diagnosis(&request(&path)).unwrap();
    assert!(response.report.is_healthy());
    assert!(response.report.candidates.is_empty());
}

#[test]
fn overrides_change_the_report_id() {
    let path = prepare_snapshot("scenario_a.yaml");
    let base = ensure_diagnosis(&request(&path)).unwrap();

    let mut tuned = request(&path);
    tuned.overrides.big_m = Some(50.0);
    let other = ensure_diagnosis(&tuned).unwrap();
    assert_ne!(base.report_id, other.report_id);
    assert_eq!(list_reports(&path).unwrap().len(), 2);
}

#[test]
fn establishing_the_point_clears_residuals() {
    let path = prepare_snapshot("balance.yaml");

    let given = ensure_diagnosis(&request(&path)).unwrap();
    assert!(!given.report.residual_violations.is_empty());
    assert!(given.nlp.is_none());

    let mut solved = request(&path);
    solved.options.nlp = NlpOptions::default();
    let response = ensure_diagnosis(&solved).unwrap();
    assert!(response.nlp.is_some());
    assert!(response.report.residual_violations.is_empty());
    assert_eq!(response.report.rank.deficiency, 1);
    assert_ne!(response.report_id, given.report_id);
}

#[test]
fn inconsistent_equalities_fail_in_the_nlp_stage() {
    let dir = prepare_snapshot("scenario_b.yaml");
    let path = dir.with_file_name("inconsistent.yaml");
    std::fs::write(
        &path,
        r#"
version: 1
name: inconsistent
variables:
  - { name: x, value: 0.0 }
constraints:
  - { name: low, terms: { x: 1.0 }, lower: 1.0, upper: 1.0 }
  - { name: high, terms: { x: 1.0 }, lower: 2.0, upper: 2.0 }
analysis:
  singular_value_threshold: { mode: machine_precision }
  candidate_tol: 1.0e-6
  big_m: 10.0
"#,
    )
    .unwrap();

    let mut req = request(&path);
    req.options.nlp = NlpOptions {
        max_iterations: 5,
        ..NlpOptions::default()
    };
    let err = ensure_diagnosis(&req).unwrap_err();
    assert!(matches!(
        err,
        AppError::Diagnostic(DiagnosticError::SolverFailure {
            stage: SolverStage::Nlp,
            ..
        })
    ));
}

#[test]
fn missing_big_m_is_invalid_input() {
    let path = prepare_snapshot("scenario_b.yaml");
    let content = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, content.replace("  big_m: 1.0e3\n", "")).unwrap();

    let err = ensure_diagnosis(&request(&path)).unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let mut with_flag = request(&path);
    with_flag.overrides.big_m = Some(1e3);
    assert!(ensure_diagnosis(&with_flag).is_ok());
}
