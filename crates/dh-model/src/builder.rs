//! Incremental model builder.

use std::collections::HashSet;

use dh_core::{ConId, Real, VarId};

use crate::differentiate::FiniteDifference;
use crate::error::{ModelError, ModelResult, check_finite};
use crate::model::{AlgebraicModel, BodyFn, ConstraintBody, ConstraintRecord};
use crate::types::{ConstraintBounds, ConstraintInfo, VariableInfo};

/// Builder for constructing a model incrementally.
///
/// Use `add_variable` and `add_linear` / `add_nonlinear` to build up the
/// model, then call `build()` to validate and freeze it into an
/// `AlgebraicModel`.
#[derive(Default)]
pub struct ModelBuilder {
    variables: Vec<VariableInfo>,
    values: Vec<Real>,
    constraints: Vec<ConstraintInfo>,
    records: Vec<ConstraintRecord>,
    differencing: FiniteDifference,
}

impl ModelBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finite difference settings for closure-defined constraints.
    pub fn with_differencing(mut self, differencing: FiniteDifference) -> Self {
        self.differencing = differencing;
        self
    }

    /// Add an unbounded free variable and return its ID.
    pub fn add_variable(&mut self, name: impl Into<String>, value: Real) -> VarId {
        self.add_bounded_variable(name, value, None, None)
    }

    /// Add a free variable with optional bounds and return its ID.
    pub fn add_bounded_variable(
        &mut self,
        name: impl Into<String>,
        value: Real,
        lower: Option<Real>,
        upper: Option<Real>,
    ) -> VarId {
        let id = VarId::from_index(self.variables.len() as u32);
        self.variables.push(VariableInfo {
            id,
            name: name.into(),
            lower,
            upper,
            fixed: false,
        });
        self.values.push(value);
        id
    }

    /// Mark a variable as fixed at its current value.
    pub fn fix(&mut self, var: VarId) {
        if let Some(info) = self.variables.get_mut(var.slot()) {
            info.fixed = true;
        }
    }

    /// Replace the bounds of a variable.
    pub fn set_bounds(&mut self, var: VarId, lower: Option<Real>, upper: Option<Real>) {
        if let Some(info) = self.variables.get_mut(var.slot()) {
            info.lower = lower;
            info.upper = upper;
        }
    }

    /// Add `bounds` on `constant + sum(coeff * var)` and return its ID.
    pub fn add_linear(
        &mut self,
        name: impl Into<String>,
        terms: &[(VarId, Real)],
        constant: Real,
        bounds: ConstraintBounds,
    ) -> ConId {
        self.push_constraint(
            name.into(),
            bounds,
            ConstraintBody::Linear {
                terms: terms.to_vec(),
                constant,
            },
        )
    }

    /// Add `bounds` on a closure over `vars` and return its ID.
    ///
    /// The closure receives the values of `vars` in the order given.
    pub fn add_nonlinear<F>(
        &mut self,
        name: impl Into<String>,
        vars: &[VarId],
        body: F,
        bounds: ConstraintBounds,
    ) -> ConId
    where
        F: Fn(&[Real]) -> Real + Send + Sync + 'static,
    {
        let body: BodyFn = Box::new(body);
        self.push_constraint(
            name.into(),
            bounds,
            ConstraintBody::Nonlinear {
                vars: vars.to_vec(),
                body,
            },
        )
    }

    fn push_constraint(
        &mut self,
        name: String,
        bounds: ConstraintBounds,
        body: ConstraintBody,
    ) -> ConId {
        let id = ConId::from_index(self.constraints.len() as u32);
        self.constraints.push(ConstraintInfo {
            id,
            name,
            kind: bounds.kind(),
        });
        self.records.push(ConstraintRecord { bounds, body });
        id
    }

    /// Validate and freeze the model.
    pub fn build(self) -> ModelResult<AlgebraicModel> {
        let mut names = HashSet::new();
        for (info, &value) in self.variables.iter().zip(&self.values) {
            if !names.insert(info.name.as_str()) {
                return Err(ModelError::DuplicateName {
                    name: info.name.clone(),
                    context: "variables",
                });
            }
            check_finite(value, || format!("value of variable {}", info.name))?;
            if let Some(bounds) = ConstraintBounds::from_parts(info.lower, info.upper) {
                bounds.validate(&info.name)?;
            }
        }

        let mut names = HashSet::new();
        for (info, record) in self.constraints.iter().zip(&self.records) {
            if !names.insert(info.name.as_str()) {
                return Err(ModelError::DuplicateName {
                    name: info.name.clone(),
                    context: "constraints",
                });
            }
            record.bounds.validate(&info.name)?;
            for var in record.body.referenced_vars() {
                if var.slot() >= self.variables.len() {
                    return Err(ModelError::UnknownVariable(var));
                }
            }
            if let ConstraintBody::Linear { terms, constant } = &record.body {
                check_finite(*constant, || format!("constant of {}", info.name))?;
                for (_, coeff) in terms {
                    check_finite(*coeff, || format!("coefficient in {}", info.name))?;
                }
            }
        }

        Ok(AlgebraicModel::from_parts(
            self.variables,
            self.values,
            self.constraints,
            self.records,
            self.differencing,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ModelAdapter;
    use crate::types::ConstraintKind;

    #[test]
    fn builder_basic() {
        let mut builder = ModelBuilder::new();
        let x = builder.add_variable("x", 1.0);
        let y = builder.add_bounded_variable("y", 2.0, Some(0.0), None);
        let c = builder.add_linear("c", &[(x, 1.0), (y, 1.0)], 0.0, ConstraintBounds::AtLeast(1.0));

        assert_eq!(x.index(), 0);
        assert_eq!(y.index(), 1);
        assert_eq!(c.index(), 0);

        let model = builder.build().unwrap();
        assert_eq!(model.list_variables().len(), 2);
        assert_eq!(model.list_constraints()[0].kind, ConstraintKind::Inequality);
    }

    #[test]
    fn builder_fix_and_bounds() {
        let mut builder = ModelBuilder::new();
        let x = builder.add_variable("x", 1.0);
        builder.fix(x);
        builder.set_bounds(x, Some(-1.0), Some(1.0));
        let model = builder.build().unwrap();

        let info = &model.list_variables()[0];
        assert!(info.fixed);
        assert_eq!(info.lower, Some(-1.0));
        assert_eq!(info.upper, Some(1.0));
    }

    #[test]
    fn builder_rejects_duplicate_names() {
        let mut builder = ModelBuilder::new();
        builder.add_variable("x", 1.0);
        builder.add_variable("x", 2.0);
        assert!(matches!(
            builder.build(),
            Err(ModelError::DuplicateName { .. })
        ));
    }

    #[test]
    fn builder_rejects_unknown_variable() {
        let mut builder = ModelBuilder::new();
        builder.add_variable("x", 1.0);
        builder.add_linear(
            "c",
            &[(VarId::from_index(5), 1.0)],
            0.0,
            ConstraintBounds::Equal(0.0),
        );
        assert!(matches!(
            builder.build(),
            Err(ModelError::UnknownVariable(_))
        ));
    }

    #[test]
    fn builder_rejects_crossed_variable_bounds() {
        let mut builder = ModelBuilder::new();
        builder.add_bounded_variable("x", 1.0, Some(2.0), Some(1.0));
        assert!(matches!(
            builder.build(),
            Err(ModelError::InvalidBounds { .. })
        ));
    }
}
