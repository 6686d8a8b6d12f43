//! Bound check: which variables sit at or near one of their bounds.

use dh_core::{Real, VarId};
use dh_model::{ModelAdapter, VariableInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BoundCheckOptions;
use crate::error::{DiagnosticResult, check_tolerance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundSide {
    Lower,
    Upper,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundViolation {
    pub variable: VarId,
    pub name: String,
    pub side: BoundSide,
    /// Signed distance to the bound; negative when the value is outside it.
    pub distance: Real,
    pub value: Real,
    pub bound: Real,
    pub fixed: bool,
}

/// Signed distance from `value` to the nearer considered bound.
fn nearest_bound(
    info: &VariableInfo,
    value: Real,
    options: &BoundCheckOptions,
) -> Option<(BoundSide, Real, Real)> {
    let lower = info
        .lower
        .filter(|lo| !options.skip_lower && lo.is_finite())
        .map(|lo| (BoundSide::Lower, value - lo, lo));
    let upper = info
        .upper
        .filter(|hi| !options.skip_upper && hi.is_finite())
        .map(|hi| (BoundSide::Upper, hi - value, hi));

    match (lower, upper) {
        (Some(l), Some(u)) => Some(if u.1 < l.1 { u } else { l }),
        (l, u) => l.or(u),
    }
}

/// Variables within `options.tol` of a finite bound, in declaration order.
///
/// Fixed variables are checked like any other: a fixed variable sitting on
/// its bound is a typical source of degenerate constraints.
pub fn check_variable_bounds(
    model: &dyn ModelAdapter,
    options: &BoundCheckOptions,
) -> DiagnosticResult<Vec<BoundViolation>> {
    let tol = check_tolerance("bound_tol", options.tol)?;

    let mut violations = Vec::new();
    for info in model.list_variables() {
        if !info.is_bounded() {
            continue;
        }
        let value = model.value(info.id)?;
        let Some((side, distance, bound)) = nearest_bound(info, value, options) else {
            continue;
        };
        let limit = if options.relative {
            tol * bound.abs().max(1.0)
        } else {
            tol
        };
        // NaN distances are reported, not skipped
        if !(distance > limit) {
            violations.push(BoundViolation {
                variable: info.id,
                name: info.name.clone(),
                side,
                distance,
                value,
                bound,
                fixed: info.fixed,
            });
        }
    }

    debug!(
        variables = model.list_variables().len(),
        violations = violations.len(),
        tol,
        "bound check"
    );
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dh_core::ConId;
    use dh_model::{AlgebraicModel, ConstraintInfo, ModelBuilder, ModelResult, SparseJacobian};

    fn opts(tol: f64) -> BoundCheckOptions {
        BoundCheckOptions {
            tol,
            ..BoundCheckOptions::default()
        }
    }

    #[test]
    fn picks_the_nearer_bound() {
        let mut b = ModelBuilder::new();
        b.add_bounded_variable("near_hi", 4.9, Some(0.0), Some(5.0));
        b.add_bounded_variable("near_lo", 0.05, Some(0.0), Some(5.0));
        b.add_bounded_variable("middle", 2.5, Some(0.0), Some(5.0));
        b.add_variable("free", 0.0);
        let model = b.build().unwrap();

        let v = check_variable_bounds(&model, &opts(0.2)).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].name, "near_hi");
        assert_eq!(v[0].side, BoundSide::Upper);
        assert!((v[0].distance - 0.1).abs() < 1e-12);
        assert_eq!(v[1].side, BoundSide::Lower);
    }

    #[test]
    fn outside_bound_has_negative_distance() {
        let mut b = ModelBuilder::new();
        b.add_bounded_variable("x", -1.0, Some(0.0), None);
        let model = b.build().unwrap();

        let v = check_variable_bounds(&model, &opts(0.0)).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].distance, -1.0);
    }

    #[test]
    fn fixed_variables_are_included() {
        let mut b = ModelBuilder::new();
        let x = b.add_bounded_variable("x", 0.0, Some(0.0), Some(1.0));
        b.fix(x);
        let model = b.build().unwrap();

        let v = check_variable_bounds(&model, &opts(1e-8)).unwrap();
        assert_eq!(v.len(), 1);
        assert!(v[0].fixed);
    }

    /// Reports every variable value as NaN.
    struct NanValues(AlgebraicModel);

    impl ModelAdapter for NanValues {
        fn list_constraints(&self) -> &[ConstraintInfo] {
            self.0.list_constraints()
        }

        fn list_variables(&self) -> &[VariableInfo] {
            self.0.list_variables()
        }

        fn residual(&self, id: ConId) -> ModelResult<Real> {
            self.0.residual(id)
        }

        fn value(&self, _id: VarId) -> ModelResult<Real> {
            Ok(Real::NAN)
        }

        fn jacobian(&self, ids: &[ConId]) -> ModelResult<SparseJacobian> {
            self.0.jacobian(ids)
        }
    }

    #[test]
    fn nan_value_is_flagged() {
        let mut b = ModelBuilder::new();
        b.add_bounded_variable("x", 2.5, Some(0.0), Some(5.0));
        b.add_variable("free", 0.0);
        let model = NanValues(b.build().unwrap());

        let v = check_variable_bounds(&model, &opts(1e-5)).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].name, "x");
        assert!(v[0].distance.is_nan());
    }

    #[test]
    fn skip_and_relative_options() {
        let mut b = ModelBuilder::new();
        b.add_bounded_variable("x", 999.5, Some(999.0), Some(2000.0));
        let model = b.build().unwrap();

        assert!(check_variable_bounds(&model, &opts(1e-3)).unwrap().is_empty());

        let relative = BoundCheckOptions {
            tol: 1e-3,
            relative: true,
            ..BoundCheckOptions::default()
        };
        assert_eq!(check_variable_bounds(&model, &relative).unwrap().len(), 1);

        let skip = BoundCheckOptions {
            skip_lower: true,
            ..relative
        };
        assert!(check_variable_bounds(&model, &skip).unwrap().is_empty());
    }
}
