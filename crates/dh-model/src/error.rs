//! Model adapter error types.

use dh_core::{ConId, VarId};
use thiserror::Error;

/// Errors raised by model adapters and Jacobian assembly.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Unknown constraint: {0}")]
    UnknownConstraint(ConId),

    #[error("Unknown variable: {0}")]
    UnknownVariable(VarId),

    #[error("Dimension mismatch: {what}")]
    DimensionMismatch { what: String },

    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: String, value: f64 },

    #[error("Invalid bounds for {what}: lower={lower:?}, upper={upper:?}")]
    InvalidBounds {
        what: String,
        lower: Option<f64>,
        upper: Option<f64>,
    },

    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: &'static str },
}

pub type ModelResult<T> = Result<T, ModelError>;

pub(crate) fn check_finite(value: f64, what: impl FnOnce() -> String) -> ModelResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::NonFinite {
            what: what(),
            value,
        })
    }
}
