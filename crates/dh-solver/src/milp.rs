//! Solver-neutral mixed-integer linear programs.

use crate::error::{SolverError, SolverResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Continuous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MilpVar {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    Le,
    Ge,
    Eq,
}

/// `sum(coeff * var) <sense> rhs`, with variables referenced by position.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRow {
    pub coeffs: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

/// A minimisation MILP. Built fresh for every solve.
#[derive(Debug, Clone, Default)]
pub struct MilpInstance {
    vars: Vec<MilpVar>,
    rows: Vec<LinearRow>,
    objective: Vec<(usize, f64)>,
}

impl MilpInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binary variable with bounds `[lower, upper]` inside `[0, 1]`.
    ///
    /// `lower = 1` fixes the variable to one.
    pub fn add_binary(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> usize {
        self.push_var(name.into(), VarKind::Binary, lower, upper)
    }

    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> usize {
        self.push_var(name.into(), VarKind::Continuous, lower, upper)
    }

    fn push_var(&mut self, name: String, kind: VarKind, lower: f64, upper: f64) -> usize {
        self.vars.push(MilpVar {
            name,
            kind,
            lower,
            upper,
        });
        self.vars.len() - 1
    }

    pub fn add_row(&mut self, coeffs: Vec<(usize, f64)>, sense: RowSense, rhs: f64) {
        self.rows.push(LinearRow { coeffs, sense, rhs });
    }

    pub fn set_objective(&mut self, objective: Vec<(usize, f64)>) {
        self.objective = objective;
    }

    pub fn vars(&self) -> &[MilpVar] {
        &self.vars
    }

    pub fn rows(&self) -> &[LinearRow] {
        &self.rows
    }

    pub fn objective(&self) -> &[(usize, f64)] {
        &self.objective
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Check indices, finiteness and bound consistency.
    pub fn validate(&self) -> SolverResult<()> {
        for var in &self.vars {
            if !(var.lower.is_finite() && var.upper.is_finite()) || var.lower > var.upper {
                return Err(SolverError::ProblemSetup {
                    what: format!(
                        "variable {} has invalid bounds [{}, {}]",
                        var.name, var.lower, var.upper
                    ),
                });
            }
            if var.kind == VarKind::Binary && (var.lower < 0.0 || var.upper > 1.0) {
                return Err(SolverError::ProblemSetup {
                    what: format!("binary {} bounds exceed [0, 1]", var.name),
                });
            }
        }

        let n = self.vars.len();
        let terms = self
            .rows
            .iter()
            .flat_map(|row| row.coeffs.iter())
            .chain(self.objective.iter());
        for &(idx, coeff) in terms {
            if idx >= n {
                return Err(SolverError::ProblemSetup {
                    what: format!("term references variable {} of {}", idx, n),
                });
            }
            if !coeff.is_finite() {
                return Err(SolverError::ProblemSetup {
                    what: format!("non-finite coefficient {} on variable {}", coeff, idx),
                });
            }
        }
        if let Some(row) = self.rows.iter().find(|row| !row.rhs.is_finite()) {
            return Err(SolverError::ProblemSetup {
                what: format!("non-finite right-hand side {}", row.rhs),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MilpStatus {
    Optimal,
    Infeasible,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct MilpOutcome {
    pub status: MilpStatus,
    /// Variable values by position; empty unless `Optimal`.
    pub values: Vec<f64>,
    pub objective: Option<f64>,
}

impl MilpOutcome {
    pub fn optimal(values: Vec<f64>, objective: f64) -> Self {
        Self {
            status: MilpStatus::Optimal,
            values,
            objective: Some(objective),
        }
    }

    pub fn infeasible() -> Self {
        Self {
            status: MilpStatus::Infeasible,
            values: Vec::new(),
            objective: None,
        }
    }

    pub fn error(what: impl Into<String>) -> Self {
        Self {
            status: MilpStatus::Error(what.into()),
            values: Vec::new(),
            objective: None,
        }
    }

    /// Positions of the binaries set to one.
    pub fn selection(&self, instance: &MilpInstance) -> Vec<usize> {
        instance
            .vars()
            .iter()
            .enumerate()
            .filter(|(i, var)| {
                var.kind == VarKind::Binary && self.values.get(*i).is_some_and(|&v| v > 0.5)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// Options shared by MILP backends.
#[derive(Debug, Clone, Copy)]
pub struct MilpOptions {
    /// Largest accepted distance of a binary from 0 or 1.
    pub integrality_tol: f64,
}

impl Default for MilpOptions {
    fn default() -> Self {
        Self {
            integrality_tol: 1e-6,
        }
    }
}

/// A blocking MILP backend.
///
/// Failures are reported through `MilpStatus`, never by panicking, so that
/// callers can isolate one bad solve from its siblings.
pub trait MilpSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, instance: &MilpInstance) -> MilpOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_catches_bad_index() {
        let mut m = MilpInstance::new();
        let x = m.add_continuous("x", 0.0, 1.0);
        m.add_row(vec![(x, 1.0), (7, 1.0)], RowSense::Le, 1.0);
        assert!(m.validate().is_err());
    }

    #[test]
    fn validate_catches_binary_bounds() {
        let mut m = MilpInstance::new();
        m.add_binary("z", 0.0, 2.0);
        assert!(m.validate().is_err());
    }

    #[test]
    fn selection_reads_binaries_only() {
        let mut m = MilpInstance::new();
        let z0 = m.add_binary("z0", 0.0, 1.0);
        let y = m.add_continuous("y", -5.0, 5.0);
        let z1 = m.add_binary("z1", 0.0, 1.0);
        assert!(m.validate().is_ok());

        let outcome = MilpOutcome::optimal(vec![1.0, 3.0, 0.0], 1.0);
        assert_eq!(outcome.selection(&m), vec![z0]);
        assert_ne!(y, z1);
        assert!(MilpOutcome::infeasible().selection(&m).is_empty());
    }
}
