//! Candidate equations: rows carrying weight in a near-null left singular
//! vector.

use dh_core::{ConId, Real};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiagnosticResult, check_tolerance};
use crate::rank::RankAnalysis;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    /// Union over all near-null vectors, in Jacobian row order.
    pub constraints: Vec<ConId>,
    /// Rows implicated by each near-null vector, smallest singular value last.
    pub per_vector: Vec<Vec<ConId>>,
}

impl CandidateSet {
    /// Number of singular vectors consumed; equals the rank deficiency.
    pub fn vectors_used(&self) -> usize {
        self.per_vector.len()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn contains(&self, id: ConId) -> bool {
        self.constraints.contains(&id)
    }
}

/// Rows whose entry magnitude exceeds `candidate_tol` in any of the
/// `deficiency` left singular vectors below the threshold.
pub fn find_candidate_equations(
    analysis: &RankAnalysis,
    candidate_tol: Real,
) -> DiagnosticResult<CandidateSet> {
    let tol = check_tolerance("candidate_tol", candidate_tol)?;
    let rows = analysis.jacobian.row_ids();

    let mut selected = vec![false; rows.len()];
    let mut per_vector = Vec::with_capacity(analysis.deficiency);
    for pair in analysis.near_null_pairs() {
        let implicated: Vec<ConId> = pair
            .left
            .iter()
            .enumerate()
            .filter(|(_, u)| u.abs() > tol)
            .map(|(row, _)| {
                selected[row] = true;
                rows[row]
            })
            .collect();
        per_vector.push(implicated);
    }

    let constraints: Vec<ConId> = rows
        .iter()
        .zip(&selected)
        .filter(|(_, keep)| **keep)
        .map(|(&id, _)| id)
        .collect();

    debug!(
        vectors = per_vector.len(),
        candidates = constraints.len(),
        tol,
        "candidate extraction"
    );
    Ok(CandidateSet {
        constraints,
        per_vector,
    })
}
