use dh_diagnostics::AnalysisState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnoseStage {
    LoadingSnapshot,
    CheckingCache,
    LoadingCachedReport,
    EstablishingPoint,
    Analysis(AnalysisState),
    SavingReport,
    Completed,
}

#[derive(Debug, Clone)]
pub struct DiagnoseProgressEvent {
    pub stage: DiagnoseStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}

impl DiagnoseProgressEvent {
    pub fn stage(stage: DiagnoseStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
        }
    }
}
