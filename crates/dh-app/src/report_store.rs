//! Content-addressed storage of diagnostic reports.
//!
//! Reports live next to the snapshot they were computed from, under
//! `.degenhunt/reports/<report id>/`, as a `manifest.json` and a
//! `report.json`.

use std::fs;
use std::path::{Path, PathBuf};

use dh_diagnostics::{AnalysisState, DegeneracyReport, DiagnosticConfig};
use dh_model::Snapshot;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportManifest {
    pub report_id: String,
    pub snapshot_name: String,
    pub timestamp: String,
    pub tool_version: String,
    pub state: AnalysisState,
    pub deficiency: usize,
    pub candidates: usize,
    pub distinct_sets: usize,
    pub failed_candidates: usize,
}

impl ReportManifest {
    pub fn for_report(
        report_id: &str,
        snapshot_name: &str,
        tool_version: &str,
        report: &DegeneracyReport,
    ) -> Self {
        Self {
            report_id: report_id.to_string(),
            snapshot_name: snapshot_name.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            tool_version: tool_version.to_string(),
            state: report.state,
            deficiency: report.rank.deficiency,
            candidates: report.candidates.len(),
            distinct_sets: report.distinct_sets.len(),
            failed_candidates: report.failures().len(),
        }
    }
}

/// Hash of everything that determines a report.
///
/// `point_key` describes how the point under analysis was established.
pub fn compute_report_id(
    snapshot: &Snapshot,
    config: &DiagnosticConfig,
    point_key: &str,
    tool_version: &str,
) -> String {
    let mut hasher = Sha256::new();

    let snapshot_json = serde_json::to_string(snapshot).unwrap_or_default();
    hasher.update(snapshot_json.as_bytes());

    let config_json = serde_json::to_string(config).unwrap_or_default();
    hasher.update(config_json.as_bytes());

    hasher.update(point_key.as_bytes());
    hasher.update(tool_version.as_bytes());

    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    root_dir: PathBuf,
}

impl ReportStore {
    pub fn new(root_dir: PathBuf) -> AppResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn for_snapshot(snapshot_path: &Path) -> AppResult<Self> {
        let snapshot_dir = snapshot_path.parent().ok_or_else(|| {
            AppError::InvalidInput("snapshot path has no parent directory".to_string())
        })?;
        Self::new(snapshot_dir.join(".degenhunt").join("reports"))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn report_dir(&self, report_id: &str) -> PathBuf {
        self.root_dir.join(report_id)
    }

    pub fn has_report(&self, report_id: &str) -> bool {
        let dir = self.report_dir(report_id);
        dir.join("manifest.json").exists() && dir.join("report.json").exists()
    }

    pub fn save_report(
        &self,
        manifest: &ReportManifest,
        report: &DegeneracyReport,
    ) -> AppResult<()> {
        let dir = self.report_dir(&manifest.report_id);
        fs::create_dir_all(&dir)?;

        fs::write(
            dir.join("manifest.json"),
            serde_json::to_string_pretty(manifest)?,
        )?;
        fs::write(dir.join("report.json"), serde_json::to_string_pretty(report)?)?;
        Ok(())
    }

    pub fn load_manifest(&self, report_id: &str) -> AppResult<ReportManifest> {
        let path = self.report_dir(report_id).join("manifest.json");
        if !path.exists() {
            return Err(AppError::ReportNotFound(report_id.to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_report(&self, report_id: &str) -> AppResult<DegeneracyReport> {
        let path = self.report_dir(report_id).join("report.json");
        if !path.exists() {
            return Err(AppError::ReportNotFound(report_id.to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Manifests of all stored reports, most recent first.
    pub fn list_reports(&self) -> AppResult<Vec<ReportManifest>> {
        let mut reports = Vec::new();
        if !self.root_dir.exists() {
            return Ok(reports);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                let report_id = entry.file_name().to_string_lossy().to_string();
                if let Ok(manifest) = self.load_manifest(&report_id) {
                    reports.push(manifest);
                }
            }
        }

        reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(reports)
    }

    pub fn delete_report(&self, report_id: &str) -> AppResult<()> {
        let dir = self.report_dir(report_id);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dh_diagnostics::SingularValueThreshold;

    fn snapshot(name: &str) -> Snapshot {
        Snapshot {
            version: dh_model::LATEST_VERSION,
            name: name.to_string(),
            variables: vec![],
            constraints: vec![],
            analysis: None,
        }
    }

    fn config() -> DiagnosticConfig {
        DiagnosticConfig::new(SingularValueThreshold::absolute(1e-8), 1e-6, 1e3)
    }

    #[test]
    fn report_id_is_stable() {
        let a = compute_report_id(&snapshot("s"), &config(), "nlp=0", "v1");
        let b = compute_report_id(&snapshot("s"), &config(), "nlp=0", "v1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn report_id_tracks_every_input() {
        let base = compute_report_id(&snapshot("s"), &config(), "nlp=0", "v1");
        assert_ne!(base, compute_report_id(&snapshot("t"), &config(), "nlp=0", "v1"));

        let mut other = config();
        other.candidate_tol = 1e-3;
        assert_ne!(base, compute_report_id(&snapshot("s"), &other, "nlp=0", "v1"));
        assert_ne!(base, compute_report_id(&snapshot("s"), &config(), "nlp=5", "v1"));
        assert_ne!(base, compute_report_id(&snapshot("s"), &config(), "nlp=0", "v2"));
    }
}
