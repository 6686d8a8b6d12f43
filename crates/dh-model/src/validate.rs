//! Snapshot validation logic.

use crate::schema::{ConstraintDef, Snapshot, VariableDef};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), ValidationError> {
    if snapshot.version == 0 || snapshot.version > crate::schema::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: snapshot.version,
        });
    }

    let mut var_names = HashSet::new();
    for var in &snapshot.variables {
        if !var_names.insert(var.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: var.name.clone(),
                context: "variables".to_string(),
            });
        }
        validate_variable(var)?;
    }

    let mut con_names = HashSet::new();
    for con in &snapshot.constraints {
        if !con_names.insert(con.name.as_str()) {
            return Err(ValidationError::DuplicateName {
                name: con.name.clone(),
                context: "constraints".to_string(),
            });
        }
        validate_constraint(con, &var_names)?;
    }

    if let Some(analysis) = &snapshot.analysis {
        let optional = [
            ("analysis.residual_tol", analysis.residual_tol),
            ("analysis.bound_tol", analysis.bound_tol),
            ("analysis.candidate_tol", analysis.candidate_tol),
            ("analysis.null_space_tol", analysis.null_space_tol),
        ];
        for (field, value) in optional {
            if let Some(v) = value {
                non_negative(field, v)?;
            }
        }
        if let Some(m) = analysis.big_m {
            if !(m.is_finite() && m > 0.0) {
                return Err(invalid("analysis.big_m", m, "must be positive and finite"));
            }
        }
    }

    Ok(())
}

fn validate_variable(var: &VariableDef) -> Result<(), ValidationError> {
    finite(&format!("variables.{}.value", var.name), var.value)?;
    check_bounds(&format!("variables.{}", var.name), var.lower, var.upper)
}

fn validate_constraint(
    con: &ConstraintDef,
    var_names: &HashSet<&str>,
) -> Result<(), ValidationError> {
    for (var, coeff) in &con.terms {
        if !var_names.contains(var.as_str()) {
            return Err(ValidationError::MissingReference {
                name: var.clone(),
                context: format!("constraint {}", con.name),
            });
        }
        finite(&format!("constraints.{}.terms.{}", con.name, var), *coeff)?;
    }
    finite(&format!("constraints.{}.constant", con.name), con.constant)?;

    if con.lower.is_none() && con.upper.is_none() {
        return Err(ValidationError::InvalidValue {
            field: format!("constraints.{}", con.name),
            value: "unbounded".to_string(),
            reason: "a constraint needs a lower or upper bound".to_string(),
        });
    }
    check_bounds(&format!("constraints.{}", con.name), con.lower, con.upper)
}

fn check_bounds(
    field: &str,
    lower: Option<f64>,
    upper: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(lo) = lower {
        finite(&format!("{field}.lower"), lo)?;
    }
    if let Some(hi) = upper {
        finite(&format!("{field}.upper"), hi)?;
    }
    if let (Some(lo), Some(hi)) = (lower, upper) {
        if lo > hi {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                value: format!("[{lo}, {hi}]"),
                reason: "lower bound exceeds upper bound".to_string(),
            });
        }
    }
    Ok(())
}

fn finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be finite"))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ValidationError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(invalid(field, value, "must be non-negative"));
    }
    Ok(())
}

fn invalid(field: &str, value: f64, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AnalysisDef;
    use std::collections::BTreeMap;

    fn var(name: &str) -> VariableDef {
        VariableDef {
            name: name.to_string(),
            value: 1.0,
            lower: None,
            upper: None,
            fixed: false,
        }
    }

    fn con(name: &str, vars: &[&str]) -> ConstraintDef {
        ConstraintDef {
            name: name.to_string(),
            terms: vars.iter().map(|v| (v.to_string(), 1.0)).collect::<BTreeMap<_, _>>(),
            constant: 0.0,
            lower: Some(1.0),
            upper: Some(1.0),
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            version: 1,
            name: "t".to_string(),
            variables: vec![var("x"), var("y")],
            constraints: vec![con("c", &["x", "y"])],
            analysis: None,
        }
    }

    #[test]
    fn valid_snapshot_passes() {
        assert!(validate_snapshot(&snapshot()).is_ok());
    }

    #[test]
    fn unsupported_version() {
        let mut s = snapshot();
        s.version = 99;
        assert!(matches!(
            validate_snapshot(&s),
            Err(ValidationError::UnsupportedVersion { version: 99 })
        ));
    }

    #[test]
    fn duplicate_variable() {
        let mut s = snapshot();
        s.variables.push(var("x"));
        assert!(matches!(
            validate_snapshot(&s),
            Err(ValidationError::DuplicateName { .. })
        ));
    }

    #[test]
    fn missing_variable_reference() {
        let mut s = snapshot();
        s.constraints.push(con("d", &["z"]));
        assert!(matches!(
            validate_snapshot(&s),
            Err(ValidationError::MissingReference { .. })
        ));
    }

    #[test]
    fn unbounded_constraint_is_invalid() {
        let mut s = snapshot();
        s.constraints[0].lower = None;
        s.constraints[0].upper = None;
        assert!(matches!(
            validate_snapshot(&s),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn crossed_variable_bounds_are_invalid() {
        let mut s = snapshot();
        s.variables[0].lower = Some(2.0);
        s.variables[0].upper = Some(1.0);
        assert!(validate_snapshot(&s).is_err());
    }

    #[test]
    fn negative_analysis_tolerance_is_invalid() {
        let mut s = snapshot();
        s.analysis = Some(AnalysisDef {
            candidate_tol: Some(-1.0),
            ..AnalysisDef::default()
        });
        assert!(validate_snapshot(&s).is_err());

        s.analysis = Some(AnalysisDef {
            big_m: Some(0.0),
            ..AnalysisDef::default()
        });
        assert!(validate_snapshot(&s).is_err());
    }
}
