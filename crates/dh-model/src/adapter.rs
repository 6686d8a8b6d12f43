//! The capability set the diagnostic core depends on.

use crate::error::ModelResult;
use crate::jacobian::SparseJacobian;
use crate::types::{ConstraintInfo, VariableInfo};
use dh_core::{ConId, Real, VarId};

/// Read-only facade over an optimization model at its current point.
///
/// Implementations decide how bodies and derivatives are evaluated; the
/// diagnostic pipeline only ever sees these five operations.
pub trait ModelAdapter {
    /// All constraints, in declaration order.
    fn list_constraints(&self) -> &[ConstraintInfo];

    /// All variables, in declaration order.
    fn list_variables(&self) -> &[VariableInfo];

    /// Signed distance of a constraint from satisfaction at the current point.
    fn residual(&self, id: ConId) -> ModelResult<Real>;

    /// Current value of a variable.
    fn value(&self, id: VarId) -> ModelResult<Real>;

    /// Jacobian of the given constraints at the current point.
    ///
    /// Rows follow `ids` exactly; columns are the free variables appearing in
    /// any of the selected constraints.
    fn jacobian(&self, ids: &[ConId]) -> ModelResult<SparseJacobian>;

    /// Ids of the equality constraints, in declaration order.
    fn equality_constraints(&self) -> Vec<ConId> {
        self.list_constraints()
            .iter()
            .filter(|c| c.is_equality())
            .map(|c| c.id)
            .collect()
    }

    fn constraint_info(&self, id: ConId) -> Option<&ConstraintInfo> {
        self.list_constraints().iter().find(|c| c.id == id)
    }

    fn variable_info(&self, id: VarId) -> Option<&VariableInfo> {
        self.list_variables().iter().find(|v| v.id == id)
    }
}

/// A model whose point can be moved, as needed by an NLP solver.
pub trait PointModel: ModelAdapter {
    fn set_value(&mut self, id: VarId, value: Real) -> ModelResult<()>;
}
