//! Residual check: which constraints are violated at the current point.

use dh_core::{ConId, Real};
use dh_model::{ConstraintKind, ModelAdapter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiagnosticResult, check_tolerance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualViolation {
    pub constraint: ConId,
    pub name: String,
    pub kind: ConstraintKind,
    pub residual: Real,
}

/// Constraints whose residual magnitude exceeds `tol`, in declaration order.
pub fn check_residuals(
    model: &dyn ModelAdapter,
    tol: Real,
) -> DiagnosticResult<Vec<ResidualViolation>> {
    let tol = check_tolerance("residual_tol", tol)?;

    let mut violations = Vec::new();
    for info in model.list_constraints() {
        let residual = model.residual(info.id)?;
        // NaN residuals are always reported
        if !(residual.abs() <= tol) {
            violations.push(ResidualViolation {
                constraint: info.id,
                name: info.name.clone(),
                kind: info.kind,
                residual,
            });
        }
    }

    debug!(
        constraints = model.list_constraints().len(),
        violations = violations.len(),
        tol,
        "residual check"
    );
    Ok(violations)
}
