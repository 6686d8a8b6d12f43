//! Thresholds and switches for the diagnostic pipeline.
//!
//! The singular value threshold, the candidate threshold and the MILP
//! bound have no defaults: their scale depends on the model and picking
//! them is left to the caller.

use serde::{Deserialize, Serialize};

use crate::error::{DiagnosticError, DiagnosticResult, check_tolerance};

/// Default tolerance for the residual and bound checks.
pub const DEFAULT_CHECK_TOL: f64 = 1e-5;

/// How the rank-deficiency threshold ε is obtained from the spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SingularValueThreshold {
    /// ε used as given.
    Absolute { value: f64 },
    /// ε = value · σ_max.
    Relative { value: f64 },
    /// ε = max(m, n) · σ_max · machine epsilon.
    MachinePrecision,
}

impl SingularValueThreshold {
    pub fn absolute(value: f64) -> Self {
        SingularValueThreshold::Absolute { value }
    }

    pub fn relative(value: f64) -> Self {
        SingularValueThreshold::Relative { value }
    }

    pub fn validate(&self) -> DiagnosticResult<()> {
        match *self {
            SingularValueThreshold::Absolute { value } => {
                check_tolerance("singular_value_threshold", value)?;
            }
            SingularValueThreshold::Relative { value } => {
                check_tolerance("singular_value_threshold", value)?;
            }
            SingularValueThreshold::MachinePrecision => {}
        }
        Ok(())
    }

    /// Absolute ε for a spectrum with largest value `sigma_max` of an
    /// `nrows x ncols` matrix.
    pub fn resolve(&self, sigma_max: f64, nrows: usize, ncols: usize) -> f64 {
        match *self {
            SingularValueThreshold::Absolute { value } => value,
            SingularValueThreshold::Relative { value } => value * sigma_max,
            SingularValueThreshold::MachinePrecision => {
                nrows.max(ncols) as f64 * sigma_max * f64::EPSILON
            }
        }
    }
}

/// Options for the variable-bound check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundCheckOptions {
    pub tol: f64,
    /// Scale `tol` by `max(1, |bound|)`.
    #[serde(default)]
    pub relative: bool,
    #[serde(default)]
    pub skip_lower: bool,
    #[serde(default)]
    pub skip_upper: bool,
}

impl Default for BoundCheckOptions {
    fn default() -> Self {
        Self {
            tol: DEFAULT_CHECK_TOL,
            relative: false,
            skip_lower: false,
            skip_upper: false,
        }
    }
}

/// Options for the irreducible degenerate set search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdsConfig {
    /// Big-M bound on the multipliers.
    pub big_m: f64,
    /// Slack on each null-space row; 0 keeps them as equalities.
    #[serde(default)]
    pub null_space_tol: f64,
    /// Solve one MILP per candidate on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
    /// Re-check each returned set with the SVD.
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_verify() -> bool {
    true
}

impl IdsConfig {
    pub fn new(big_m: f64) -> Self {
        Self {
            big_m,
            null_space_tol: 0.0,
            parallel: false,
            verify: true,
        }
    }

    pub fn validate(&self) -> DiagnosticResult<()> {
        let big_m = check_tolerance("big_m", self.big_m)?;
        // The seed multiplier is normalised to 1 and must stay inside [-M, M].
        if big_m < 1.0 {
            return Err(DiagnosticError::InvalidTolerance {
                what: "big_m",
                value: big_m,
                reason: "must be at least 1",
            });
        }
        check_tolerance("null_space_tol", self.null_space_tol)?;
        Ok(())
    }
}

/// Full configuration of one diagnostic run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticConfig {
    pub residual_tol: f64,
    pub bounds: BoundCheckOptions,
    pub singular_value_threshold: SingularValueThreshold,
    pub candidate_tol: f64,
    pub ids: IdsConfig,
}

impl DiagnosticConfig {
    /// Configuration with default check tolerances and the required
    /// thresholds supplied explicitly.
    pub fn new(
        singular_value_threshold: SingularValueThreshold,
        candidate_tol: f64,
        big_m: f64,
    ) -> Self {
        Self {
            residual_tol: DEFAULT_CHECK_TOL,
            bounds: BoundCheckOptions::default(),
            singular_value_threshold,
            candidate_tol,
            ids: IdsConfig::new(big_m),
        }
    }

    pub fn validate(&self) -> DiagnosticResult<()> {
        check_tolerance("residual_tol", self.residual_tol)?;
        check_tolerance("bound_tol", self.bounds.tol)?;
        self.singular_value_threshold.validate()?;
        check_tolerance("candidate_tol", self.candidate_tol)?;
        self.ids.validate()
    }
}
