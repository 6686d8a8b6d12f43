//! Constraint and variable descriptors exposed by a model adapter.

use crate::error::{ModelError, ModelResult};
use dh_core::{ConId, Real, VarId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Equality,
    Inequality,
}

/// Identity and kind of one constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintInfo {
    pub id: ConId,
    pub name: String,
    pub kind: ConstraintKind,
}

impl ConstraintInfo {
    pub fn is_equality(&self) -> bool {
        self.kind == ConstraintKind::Equality
    }
}

/// Identity, bounds and fixed flag of one variable.
///
/// The current value is not part of the descriptor; ask the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub id: VarId,
    pub name: String,
    pub lower: Option<Real>,
    pub upper: Option<Real>,
    pub fixed: bool,
}

impl VariableInfo {
    pub fn is_bounded(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }
}

/// Bounds on a constraint body: `lower <= body(x) <= upper`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintBounds {
    Equal(Real),
    AtLeast(Real),
    AtMost(Real),
    Range(Real, Real),
}

impl ConstraintBounds {
    /// Rebuild bounds from optional parts. Returns None for a free row.
    pub fn from_parts(lower: Option<Real>, upper: Option<Real>) -> Option<Self> {
        match (lower, upper) {
            (Some(lo), Some(hi)) if lo == hi => Some(ConstraintBounds::Equal(lo)),
            (Some(lo), Some(hi)) => Some(ConstraintBounds::Range(lo, hi)),
            (Some(lo), None) => Some(ConstraintBounds::AtLeast(lo)),
            (None, Some(hi)) => Some(ConstraintBounds::AtMost(hi)),
            (None, None) => None,
        }
    }

    pub fn lower(&self) -> Option<Real> {
        match *self {
            ConstraintBounds::Equal(v) | ConstraintBounds::AtLeast(v) => Some(v),
            ConstraintBounds::Range(lo, _) => Some(lo),
            ConstraintBounds::AtMost(_) => None,
        }
    }

    pub fn upper(&self) -> Option<Real> {
        match *self {
            ConstraintBounds::Equal(v) | ConstraintBounds::AtMost(v) => Some(v),
            ConstraintBounds::Range(_, hi) => Some(hi),
            ConstraintBounds::AtLeast(_) => None,
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        match *self {
            ConstraintBounds::Equal(_) => ConstraintKind::Equality,
            ConstraintBounds::Range(lo, hi) if lo == hi => ConstraintKind::Equality,
            _ => ConstraintKind::Inequality,
        }
    }

    /// Signed distance from satisfaction.
    ///
    /// Equalities return `body - rhs`. Inequalities return 0 inside the
    /// bounds, `body - lower` (negative) below, `body - upper` (positive) above.
    pub fn residual(&self, body: Real) -> Real {
        if let ConstraintKind::Equality = self.kind() {
            // lower == upper for every equality variant
            return body - self.lower().unwrap_or(body);
        }
        if let Some(lo) = self.lower() {
            if body < lo {
                return body - lo;
            }
        }
        if let Some(hi) = self.upper() {
            if body > hi {
                return body - hi;
            }
        }
        0.0
    }

    pub fn validate(&self, what: &str) -> ModelResult<()> {
        let lower = self.lower();
        let upper = self.upper();
        let finite = lower.is_none_or(f64::is_finite) && upper.is_none_or(f64::is_finite);
        let ordered = match (lower, upper) {
            (Some(lo), Some(hi)) => lo <= hi,
            _ => true,
        };
        if finite && ordered {
            Ok(())
        } else {
            Err(ModelError::InvalidBounds {
                what: what.to_string(),
                lower,
                upper,
            })
        }
    }
}
