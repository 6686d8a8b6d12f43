//! Snapshot file schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Newest snapshot format version this crate reads.
pub const LATEST_VERSION: u32 = 1;

/// A model captured at one point: variables with values and bounds, plus
/// constraints as affine forms `constant + sum(terms[var] * var)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub variables: Vec<VariableDef>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableDef {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    #[serde(default)]
    pub fixed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConstraintDef {
    pub name: String,
    #[serde(default)]
    pub terms: BTreeMap<String, f64>,
    #[serde(default)]
    pub constant: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

/// Optional analysis thresholds stored alongside a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_tol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_tol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singular_value_threshold: Option<ThresholdDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_tol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_space_tol: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdDef {
    Absolute { value: f64 },
    Relative { value: f64 },
    MachinePrecision,
}
