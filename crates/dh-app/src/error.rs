//! Error types for the dh-app service layer.

use std::path::PathBuf;

use dh_diagnostics::DiagnosticError;

/// Application error type that wraps errors from the backend crates and
/// gives the frontends a single error interface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Failed to read snapshot file: {path}")]
    SnapshotFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Snapshot validation failed: {0}")]
    Validation(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),

    #[error("Report store error: {0}")]
    Reports(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for dh-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<dh_model::SnapshotError> for AppError {
    fn from(err: dh_model::SnapshotError) -> Self {
        match err {
            dh_model::SnapshotError::Validation(e) => AppError::Validation(e.to_string()),
            dh_model::SnapshotError::Model(e) => AppError::Model(e.to_string()),
            other => AppError::Snapshot(other.to_string()),
        }
    }
}

impl From<dh_model::ModelError> for AppError {
    fn from(err: dh_model::ModelError) -> Self {
        AppError::Model(err.to_string())
    }
}

impl From<dh_solver::SolverError> for AppError {
    fn from(err: dh_solver::SolverError) -> Self {
        AppError::Solver(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Reports(err.to_string())
    }
}
