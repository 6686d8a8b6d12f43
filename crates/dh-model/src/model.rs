//! In-memory model adapter.

use dh_core::{ConId, Real, VarId};

use crate::adapter::{ModelAdapter, PointModel};
use crate::differentiate::FiniteDifference;
use crate::error::{ModelError, ModelResult, check_finite};
use crate::jacobian::SparseJacobian;
use crate::types::{ConstraintBounds, ConstraintInfo, VariableInfo};

pub(crate) type BodyFn = Box<dyn Fn(&[Real]) -> Real + Send + Sync>;

pub(crate) enum ConstraintBody {
    Linear {
        terms: Vec<(VarId, Real)>,
        constant: Real,
    },
    Nonlinear {
        vars: Vec<VarId>,
        body: BodyFn,
    },
}

impl ConstraintBody {
    pub(crate) fn referenced_vars(&self) -> Vec<VarId> {
        match self {
            ConstraintBody::Linear { terms, .. } => terms.iter().map(|(v, _)| *v).collect(),
            ConstraintBody::Nonlinear { vars, .. } => vars.clone(),
        }
    }
}

pub(crate) struct ConstraintRecord {
    pub(crate) bounds: ConstraintBounds,
    pub(crate) body: ConstraintBody,
}

/// Model whose constraints are linear forms or closures over its variables.
///
/// Linear constraints have exact gradients; closure constraints are
/// differentiated numerically. Fixed variables are treated as parameters:
/// they feed the bodies but never become Jacobian columns.
pub struct AlgebraicModel {
    variables: Vec<VariableInfo>,
    values: Vec<Real>,
    constraints: Vec<ConstraintInfo>,
    records: Vec<ConstraintRecord>,
    differencing: FiniteDifference,
}

impl AlgebraicModel {
    pub(crate) fn from_parts(
        variables: Vec<VariableInfo>,
        values: Vec<Real>,
        constraints: Vec<ConstraintInfo>,
        records: Vec<ConstraintRecord>,
        differencing: FiniteDifference,
    ) -> Self {
        Self {
            variables,
            values,
            constraints,
            records,
            differencing,
        }
    }

    /// Current point, indexed by `VarId::slot()`.
    pub fn values(&self) -> &[Real] {
        &self.values
    }

    pub fn find_variable(&self, name: &str) -> Option<VarId> {
        self.variables.iter().find(|v| v.name == name).map(|v| v.id)
    }

    pub fn find_constraint(&self, name: &str) -> Option<ConId> {
        self.constraints.iter().find(|c| c.name == name).map(|c| c.id)
    }

    pub fn bounds(&self, id: ConId) -> ModelResult<ConstraintBounds> {
        Ok(self.record(id)?.bounds)
    }

    /// Value of the constraint body at the current point.
    pub fn body_value(&self, id: ConId) -> ModelResult<Real> {
        let record = self.record(id)?;
        let value = match &record.body {
            ConstraintBody::Linear { terms, constant } => {
                constant
                    + terms
                        .iter()
                        .map(|(var, coeff)| coeff * self.values[var.slot()])
                        .sum::<Real>()
            }
            ConstraintBody::Nonlinear { vars, body } => body(&self.local_values(vars)),
        };
        check_finite(value, || format!("body of constraint {}", id))
    }

    /// Gradient of one constraint body with respect to its free variables.
    pub fn gradient(&self, id: ConId) -> ModelResult<Vec<(VarId, Real)>> {
        let record = self.record(id)?;
        let gradient: Vec<(VarId, Real)> = match &record.body {
            ConstraintBody::Linear { terms, .. } => terms.clone(),
            ConstraintBody::Nonlinear { vars, body } => {
                let local = self.local_values(vars);
                let partials = self.differencing.gradient(&local, |x| body(x))?;
                vars.iter().copied().zip(partials).collect()
            }
        };
        Ok(gradient
            .into_iter()
            .filter(|(var, _)| !self.variables[var.slot()].fixed)
            .collect())
    }

    fn local_values(&self, vars: &[VarId]) -> Vec<Real> {
        vars.iter().map(|v| self.values[v.slot()]).collect()
    }

    fn record(&self, id: ConId) -> ModelResult<&ConstraintRecord> {
        self.records
            .get(id.slot())
            .ok_or(ModelError::UnknownConstraint(id))
    }
}

impl ModelAdapter for AlgebraicModel {
    fn list_constraints(&self) -> &[ConstraintInfo] {
        &self.constraints
    }

    fn list_variables(&self) -> &[VariableInfo] {
        &self.variables
    }

    fn residual(&self, id: ConId) -> ModelResult<Real> {
        let body = self.body_value(id)?;
        Ok(self.record(id)?.bounds.residual(body))
    }

    fn value(&self, id: VarId) -> ModelResult<Real> {
        self.values
            .get(id.slot())
            .copied()
            .ok_or(ModelError::UnknownVariable(id))
    }

    fn jacobian(&self, ids: &[ConId]) -> ModelResult<SparseJacobian> {
        let gradients = ids
            .iter()
            .map(|&id| self.gradient(id))
            .collect::<ModelResult<Vec<_>>>()?;
        SparseJacobian::from_row_gradients(ids.to_vec(), &gradients)
    }

    fn constraint_info(&self, id: ConId) -> Option<&ConstraintInfo> {
        self.constraints.get(id.slot())
    }

    fn variable_info(&self, id: VarId) -> Option<&VariableInfo> {
        self.variables.get(id.slot())
    }
}

impl PointModel for AlgebraicModel {
    fn set_value(&mut self, id: VarId, value: Real) -> ModelResult<()> {
        let value = check_finite(value, || format!("new value of variable {}", id))?;
        let slot = self
            .values
            .get_mut(id.slot())
            .ok_or(ModelError::UnknownVariable(id))?;
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;

    #[test]
    fn residuals_follow_bounds() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable("x", 1.0);
        let y = b.add_variable("y", 1.0);
        let eq = b.add_linear("eq", &[(x, 1.0), (y, 1.0)], 0.0, ConstraintBounds::Equal(1.0));
        let ge = b.add_linear("ge", &[(x, 1.0)], 0.0, ConstraintBounds::AtLeast(10.0));
        let model = b.build().unwrap();

        assert_eq!(model.residual(eq).unwrap(), 1.0);
        assert_eq!(model.residual(ge).unwrap(), -9.0);
    }

    #[test]
    fn nonlinear_jacobian_by_differencing() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable("x", 2.0);
        let y = b.add_variable("y", 3.0);
        let c = b.add_nonlinear("xy", &[x, y], |v| v[0] * v[1], ConstraintBounds::Equal(6.0));
        let model = b.build().unwrap();

        assert_eq!(model.residual(c).unwrap(), 0.0);
        let dense = model.jacobian(&[c]).unwrap().to_dense();
        assert!((dense[(0, 0)] - 3.0).abs() < 1e-6);
        assert!((dense[(0, 1)] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn fixed_variables_are_not_columns() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable("x", 1.0);
        let p = b.add_variable("p", 4.0);
        b.fix(p);
        let c = b.add_linear("c", &[(x, 2.0), (p, 1.0)], 0.0, ConstraintBounds::Equal(6.0));
        let model = b.build().unwrap();

        let jac = model.jacobian(&[c]).unwrap();
        assert_eq!(jac.col_ids(), &[x]);
        assert_eq!(model.residual(c).unwrap(), 0.0);
    }

    #[test]
    fn set_value_moves_point() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable("x", 1.0);
        let c = b.add_linear("c", &[(x, 1.0)], 0.0, ConstraintBounds::Equal(3.0));
        let mut model = b.build().unwrap();

        model.set_value(x, 3.0).unwrap();
        assert_eq!(model.value(x).unwrap(), 3.0);
        assert_eq!(model.residual(c).unwrap(), 0.0);
        assert!(model.set_value(x, f64::NAN).is_err());
        assert!(model.value(VarId::from_index(9)).is_err());
    }

    #[test]
    fn lookup_by_name() {
        let mut b = ModelBuilder::new();
        let x = b.add_variable("x", 1.0);
        let c = b.add_linear("c", &[(x, 1.0)], 0.0, ConstraintBounds::AtMost(3.0));
        let model = b.build().unwrap();

        assert_eq!(model.find_variable("x"), Some(x));
        assert_eq!(model.find_constraint("c"), Some(c));
        assert_eq!(model.find_constraint("missing"), None);
    }
}
