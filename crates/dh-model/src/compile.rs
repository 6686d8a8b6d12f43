//! Conversion between snapshot files and in-memory models.

use std::collections::{BTreeMap, HashMap};

use dh_core::{Real, VarId};

use crate::adapter::ModelAdapter;
use crate::builder::ModelBuilder;
use crate::error::ModelResult;
use crate::model::AlgebraicModel;
use crate::schema::{ConstraintDef, LATEST_VERSION, Snapshot, VariableDef};
use crate::types::ConstraintBounds;
use crate::validate::{ValidationError, validate_snapshot};
use crate::SnapshotResult;

/// Validate a snapshot and build the model it describes.
pub fn compile_snapshot(snapshot: &Snapshot) -> SnapshotResult<AlgebraicModel> {
    validate_snapshot(snapshot)?;

    let mut builder = ModelBuilder::new();
    let mut by_name: HashMap<&str, VarId> = HashMap::with_capacity(snapshot.variables.len());

    for def in &snapshot.variables {
        let id = builder.add_bounded_variable(def.name.clone(), def.value, def.lower, def.upper);
        if def.fixed {
            builder.fix(id);
        }
        by_name.insert(def.name.as_str(), id);
    }

    for def in &snapshot.constraints {
        let mut terms = Vec::with_capacity(def.terms.len());
        for (var_name, &coeff) in &def.terms {
            let id = by_name.get(var_name.as_str()).copied().ok_or_else(|| {
                ValidationError::MissingReference {
                    name: var_name.clone(),
                    context: format!("constraint {}", def.name),
                }
            })?;
            terms.push((id, coeff));
        }
        let bounds = ConstraintBounds::from_parts(def.lower, def.upper).ok_or_else(|| {
            ValidationError::InvalidValue {
                field: format!("constraints.{}", def.name),
                value: "unbounded".to_string(),
                reason: "a constraint needs a lower or upper bound".to_string(),
            }
        })?;
        builder.add_linear(def.name.clone(), &terms, def.constant, bounds);
    }

    Ok(builder.build()?)
}

/// Capture a model at its current point as an affine snapshot.
///
/// Each constraint becomes its first-order expansion over the free
/// variables; fixed variables are folded into the constant. The snapshot is
/// exact for linear models.
pub fn linearize_model(model: &AlgebraicModel, name: impl Into<String>) -> ModelResult<Snapshot> {
    let variables: Vec<VariableDef> = model
        .list_variables()
        .iter()
        .map(|info| VariableDef {
            name: info.name.clone(),
            value: model.values()[info.id.slot()],
            lower: info.lower,
            upper: info.upper,
            fixed: info.fixed,
        })
        .collect();

    let mut constraints = Vec::with_capacity(model.list_constraints().len());
    for info in model.list_constraints() {
        let gradient = model.gradient(info.id)?;
        let body = model.body_value(info.id)?;
        let bounds = model.bounds(info.id)?;

        let mut terms: BTreeMap<String, Real> = BTreeMap::new();
        let mut constant = body;
        for (var, coeff) in gradient {
            constant -= coeff * model.values()[var.slot()];
            *terms
                .entry(model.list_variables()[var.slot()].name.clone())
                .or_insert(0.0) += coeff;
        }

        constraints.push(ConstraintDef {
            name: info.name.clone(),
            terms,
            constant,
            lower: bounds.lower(),
            upper: bounds.upper(),
        });
    }

    Ok(Snapshot {
        version: LATEST_VERSION,
        name: name.into(),
        variables,
        constraints,
        analysis: None,
    })
}
