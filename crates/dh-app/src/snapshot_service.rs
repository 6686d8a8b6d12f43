//! Snapshot loading, saving, compilation and introspection.

use std::path::Path;

use dh_model::{AlgebraicModel, ModelSummary, Snapshot, summarize};
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Counts shown by `summary`, plus the snapshot's name.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub name: String,
    pub version: u32,
    pub has_analysis: bool,
    #[serde(flatten)]
    pub model: ModelSummary,
}

/// Load and validate a snapshot (`.yaml`, `.yml` or `.json`).
pub fn load_snapshot(path: &Path) -> AppResult<Snapshot> {
    if !path.exists() {
        return Err(AppError::SnapshotFileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    Ok(dh_model::load_snapshot(path)?)
}

/// Save a snapshot, picking the format from the extension.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> AppResult<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => dh_model::save_json(path, snapshot)?,
        _ => dh_model::save_yaml(path, snapshot)?,
    }
    Ok(())
}

pub fn compile_snapshot(snapshot: &Snapshot) -> AppResult<AlgebraicModel> {
    Ok(dh_model::compile_snapshot(snapshot)?)
}

pub fn summarize_snapshot(snapshot: &Snapshot) -> AppResult<SnapshotSummary> {
    let model = compile_snapshot(snapshot)?;
    Ok(SnapshotSummary {
        name: snapshot.name.clone(),
        version: snapshot.version,
        has_analysis: snapshot.analysis.is_some(),
        model: summarize(&model),
    })
}
