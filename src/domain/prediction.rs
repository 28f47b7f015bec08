// ============================================================
// Layer 3 — Prediction Domain Types
// ============================================================
// What a classification returns to the caller:
//
//   top3 — up to TOP_K (label, confidence) pairs, best first
//   top1 — the head of top3
//
// Ranking works on a plain probability vector so it can be
// tested without a network. Ties keep the network's output
// order (stable sort, lower index first).

use serde::{Deserialize, Serialize};

use crate::domain::labels::LabelSet;

/// How many ranked classes a prediction returns
pub const TOP_K: usize = 3;

/// Confidences are reported with this many decimal places
const CONFIDENCE_DECIMALS: i32 = 4;

/// One ranked class with its softmax probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f32,
}

/// The response body of a successful prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub top1: Prediction,
    pub top3: Vec<Prediction>,
}

impl PredictionResult {
    /// Build a result from a softmax probability vector.
    /// Returns None when the vector is empty or longer than
    /// the label set (the caller checks counts beforehand).
    pub fn from_probabilities(probs: &[f32], labels: &LabelSet) -> Option<Self> {
        let top3 = rank_top_k(probs, TOP_K)
            .into_iter()
            .map(|(index, p)| {
                labels.name(index).map(|name| Prediction {
                    class_name: name.to_string(),
                    confidence: round_confidence(p),
                })
            })
            .collect::<Option<Vec<_>>>()?;

        let top1 = top3.first()?.clone();
        Some(Self { top1, top3 })
    }
}

/// Indices and values of the `k` largest probabilities,
/// largest first; k is clamped to the vector length.
pub fn rank_top_k(probs: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    // sort_by is stable, so equal scores stay in index order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k.min(probs.len()));
    ranked
}

fn round_confidence(p: f32) -> f32 {
    let scale = 10f32.powi(CONFIDENCE_DECIMALS);
    ((p * scale).round() / scale).clamp(0.0, 1.0)
}
