//! Weighted soft-voting over member probability matrices.
//!
//! The evaluator, the final fit and the inference service all go through
//! `combine` with members in `MemberKind::ALL` order, so the weights used at
//! serving time are exactly the ones that were scored during the search.
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::MemberKind;
use crate::error::{EnsembleError, Result};
use crate::models::{ClassifierModel, Member};

/// One non-negative combination weight per member. Only ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub gbdt: f64,
    pub random_forest: f64,
    pub logistic: f64,
}

impl EnsembleWeights {
    pub fn new(gbdt: f64, random_forest: f64, logistic: f64) -> Result<Self> {
        let weights = EnsembleWeights {
            gbdt,
            random_forest,
            logistic,
        };
        validate_weights(&weights.to_array())?;
        Ok(weights)
    }

    pub fn get(&self, kind: MemberKind) -> f64 {
        match kind {
            MemberKind::Gbdt => self.gbdt,
            MemberKind::RandomForest => self.random_forest,
            MemberKind::Logistic => self.logistic,
        }
    }

    /// Weights in `MemberKind::ALL` order.
    pub fn to_array(&self) -> [f64; 3] {
        MemberKind::ALL.map(|kind| self.get(kind))
    }

    /// Weights scaled to sum to one.
    pub fn normalized(&self) -> Result<[f64; 3]> {
        let weights = self.to_array();
        let total = validate_weights(&weights)?;
        Ok(weights.map(|w| w / total))
    }
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        EnsembleWeights {
            gbdt: 1.0,
            random_forest: 1.0,
            logistic: 1.0,
        }
    }
}

/// Check weights and return their sum.
fn validate_weights(weights: &[f64]) -> Result<f64> {
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(EnsembleError::InvalidWeights(format!(
            "weights must be finite and non-negative, got {}",
            bad
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(EnsembleError::InvalidWeights(
            "weights sum to zero".to_string(),
        ));
    }
    Ok(total)
}

/// Weighted arithmetic mean of per-class probability matrices.
///
/// # Arguments
///
/// * `prob_matrices` - One `(n_samples, n_classes)` matrix per member
/// * `weights` - One non-negative weight per matrix, same order
///
/// # Returns
///
/// `Σ wᵢ·Pᵢ / Σ wᵢ`, element-wise.
pub fn combine(prob_matrices: &[Array2<f64>], weights: &[f64]) -> Result<Array2<f64>> {
    if prob_matrices.is_empty() || prob_matrices.len() != weights.len() {
        return Err(EnsembleError::InvalidWeights(format!(
            "{} probability matrices but {} weights",
            prob_matrices.len(),
            weights.len()
        )));
    }
    let total = validate_weights(weights)?;

    let shape = prob_matrices[0].dim();
    let mut combined = Array2::<f64>::zeros(shape);
    for (matrix, &weight) in prob_matrices.iter().zip(weights) {
        if matrix.dim() != shape {
            return Err(EnsembleError::Shape {
                expected: shape.1,
                found: matrix.ncols(),
            });
        }
        combined.scaled_add(weight, matrix);
    }
    combined.mapv_inplace(|p| p / total);
    Ok(combined)
}

/// Combined probabilities of fitted members, weighted by member kind.
pub fn predict_ensemble(
    members: &[Member],
    weights: &EnsembleWeights,
    x: &Array2<f64>,
) -> Result<Array2<f64>> {
    let probs = members
        .iter()
        .map(|m| m.predict_proba(x))
        .collect::<Result<Vec<_>>>()?;
    let member_weights: Vec<f64> = members.iter().map(|m| weights.get(m.kind())).collect();
    combine(&probs, &member_weights)
}

/// Index of the largest value in each row; the first maximum wins ties.
pub fn argmax_rows(probs: &Array2<f64>) -> Array1<usize> {
    probs
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            for (i, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}
