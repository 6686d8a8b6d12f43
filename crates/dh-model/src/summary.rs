//! Structural counts for a model.

use serde::Serialize;

use crate::adapter::ModelAdapter;
use crate::types::ConstraintKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub variables: usize,
    pub fixed_variables: usize,
    pub bounded_variables: usize,
    pub equality_constraints: usize,
    pub inequality_constraints: usize,
    /// Free variables minus equality constraints.
    pub degrees_of_freedom: i64,
}

pub fn summarize(model: &dyn ModelAdapter) -> ModelSummary {
    let vars = model.list_variables();
    let cons = model.list_constraints();

    let fixed_variables = vars.iter().filter(|v| v.fixed).count();
    let bounded_variables = vars.iter().filter(|v| v.is_bounded()).count();
    let equality_constraints = cons
        .iter()
        .filter(|c| c.kind == ConstraintKind::Equality)
        .count();

    ModelSummary {
        variables: vars.len(),
        fixed_variables,
        bounded_variables,
        equality_constraints,
        inequality_constraints: cons.len() - equality_constraints,
        degrees_of_freedom: (vars.len() - fixed_variables) as i64 - equality_constraints as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;
    use crate::types::ConstraintBounds;

    #[test]
    fn summary_counts() {
        let mut b = ModelBuilder::new();
        let x = b.add_bounded_variable("x", 1.0, Some(0.0), None);
        let y = b.add_variable("y", 1.0);
        let z = b.add_variable("z", 1.0);
        b.fix(z);
        b.add_linear("e", &[(x, 1.0), (y, 1.0)], 0.0, ConstraintBounds::Equal(2.0));
        b.add_linear("i", &[(x, 1.0)], 0.0, ConstraintBounds::AtMost(2.0));
        let model = b.build().unwrap();

        let s = summarize(&model);
        assert_eq!(s.variables, 3);
        assert_eq!(s.fixed_variables, 1);
        assert_eq!(s.bounded_variables, 1);
        assert_eq!(s.equality_constraints, 1);
        assert_eq!(s.inequality_constraints, 1);
        assert_eq!(s.degrees_of_freedom, 1);
    }
}
