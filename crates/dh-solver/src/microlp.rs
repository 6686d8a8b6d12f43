//! `MilpSolver` backed by `good_lp` with the pure-Rust microlp solver.

use good_lp::solvers::microlp::microlp;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    variable,
};
use tracing::debug;

use crate::milp::{MilpInstance, MilpOptions, MilpOutcome, MilpSolver, RowSense, VarKind};

#[derive(Debug, Clone, Default)]
pub struct MicroLpSolver {
    options: MilpOptions,
}

impl MicroLpSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: MilpOptions) -> Self {
        Self { options }
    }
}

fn linear_expression(handles: &[Variable], coeffs: &[(usize, f64)]) -> Expression {
    let mut expr = Expression::from(0.0);
    for &(idx, coeff) in coeffs {
        expr += coeff * handles[idx];
    }
    expr
}

impl MilpSolver for MicroLpSolver {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(&self, instance: &MilpInstance) -> MilpOutcome {
        if let Err(err) = instance.validate() {
            return MilpOutcome::error(err.to_string());
        }

        let mut vars = ProblemVariables::new();
        let handles: Vec<Variable> = instance
            .vars()
            .iter()
            .map(|v| {
                let def = match v.kind {
                    VarKind::Binary => variable().integer(),
                    VarKind::Continuous => variable(),
                };
                vars.add(def.min(v.lower).max(v.upper).name(v.name.clone()))
            })
            .collect();

        let objective = linear_expression(&handles, instance.objective());
        let mut problem = vars.minimise(objective).using(microlp);
        for row in instance.rows() {
            let lhs = linear_expression(&handles, &row.coeffs);
            let rhs = row.rhs;
            problem = match row.sense {
                RowSense::Le => problem.with(constraint!(lhs <= rhs)),
                RowSense::Ge => problem.with(constraint!(lhs >= rhs)),
                RowSense::Eq => problem.with(constraint!(lhs == rhs)),
            };
        }

        debug!(
            vars = instance.num_vars(),
            rows = instance.num_rows(),
            "solving MILP with microlp"
        );

        let solution = match problem.solve() {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => return MilpOutcome::infeasible(),
            Err(other) => return MilpOutcome::error(other.to_string()),
        };

        let values: Vec<f64> = handles.iter().map(|&h| solution.value(h)).collect();

        for (var, &value) in instance.vars().iter().zip(&values) {
            if var.kind == VarKind::Binary {
                let gap = (value - value.round()).abs();
                if gap > self.options.integrality_tol {
                    return MilpOutcome::error(format!(
                        "binary {} returned fractional value {}",
                        var.name, value
                    ));
                }
            }
        }

        let objective = instance
            .objective()
            .iter()
            .map(|&(idx, coeff)| coeff * values[idx])
            .sum();
        MilpOutcome::optimal(values, objective)
    }
}
