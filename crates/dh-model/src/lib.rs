//! dh-model: the model adapter boundary for degeneracy analysis.
//!
//! Provides:
//! - The `ModelAdapter` capability set the diagnostic core depends on
//! - Constraint/variable descriptors and the sparse Jacobian snapshot
//! - `ModelBuilder` / `AlgebraicModel`, an in-memory adapter with linear and
//!   closure-based constraints
//! - The snapshot file format (YAML/JSON), its validation and compilation
//!
//! # Example
//!
//! ```
//! use dh_model::{ConstraintBounds, ModelAdapter, ModelBuilder};
//!
//! let mut builder = ModelBuilder::new();
//! let x = builder.add_bounded_variable("x", 1.0, Some(0.0), Some(5.0));
//! let y = builder.add_variable("y", 2.0);
//! builder.add_linear("sum", &[(x, 1.0), (y, 1.0)], 0.0, ConstraintBounds::Equal(3.0));
//! let model = builder.build().unwrap();
//!
//! assert_eq!(model.list_constraints().len(), 1);
//! assert_eq!(model.equality_constraints().len(), 1);
//! ```

pub mod adapter;
pub mod builder;
pub mod compile;
pub mod differentiate;
pub mod error;
pub mod indexing;
pub mod jacobian;
pub mod model;
pub mod schema;
pub mod summary;
pub mod types;
pub mod validate;

// Re-exports for ergonomics
pub use adapter::{ModelAdapter, PointModel};
pub use builder::ModelBuilder;
pub use compile::{compile_snapshot, linearize_model};
pub use differentiate::{DifferenceScheme, FiniteDifference};
pub use error::{ModelError, ModelResult};
pub use indexing::ColumnIndex;
pub use jacobian::{JacobianEntry, SparseJacobian};
pub use model::AlgebraicModel;
pub use schema::*;
pub use summary::{ModelSummary, summarize};
pub use types::{ConstraintBounds, ConstraintInfo, ConstraintKind, VariableInfo};
pub use validate::{ValidationError, validate_snapshot};

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Unsupported snapshot format: {what}")]
    UnsupportedFormat { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &std::path::Path) -> SnapshotResult<Snapshot> {
    let content = std::fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_yaml::from_str(&content)?;
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

pub fn save_yaml(path: &std::path::Path, snapshot: &Snapshot) -> SnapshotResult<()> {
    validate_snapshot(snapshot)?;
    let content = serde_yaml::to_string(snapshot)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> SnapshotResult<Snapshot> {
    let content = std::fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

pub fn save_json(path: &std::path::Path, snapshot: &Snapshot) -> SnapshotResult<()> {
    validate_snapshot(snapshot)?;
    let content = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a snapshot, picking the format from the file extension.
pub fn load_snapshot(path: &std::path::Path) -> SnapshotResult<Snapshot> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => load_yaml(path),
        Some("json") => load_json(path),
        other => Err(SnapshotError::UnsupportedFormat {
            what: format!("extension {:?} (expected .yaml, .yml or .json)", other),
        }),
    }
}
