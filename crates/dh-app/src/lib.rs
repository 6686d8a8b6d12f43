//! Shared application service layer for degeneracy analysis.
//!
//! Frontends go through this crate to load snapshots, run diagnoses with
//! progress reporting, and read back stored reports.

pub mod diagnose_service;
pub mod error;
pub mod progress;
pub mod report_store;
pub mod snapshot_service;

pub use diagnose_service::{
    AnalysisOverrides, DiagnoseOptions, DiagnoseRequest, DiagnoseResponse, bound_report,
    ensure_diagnosis, ensure_diagnosis_with_progress, list_reports, load_report, rank_report,
    residual_report, resolve_config,
};
pub use error::{AppError, AppResult};
pub use progress::{DiagnoseProgressEvent, DiagnoseStage};
pub use report_store::{ReportManifest, ReportStore, compute_report_id};
pub use snapshot_service::{
    SnapshotSummary, compile_snapshot, load_snapshot, save_snapshot, summarize_snapshot,
};
