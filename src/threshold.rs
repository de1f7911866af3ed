//! Recall-constrained decision threshold selection.
//!
//! Converts a model's validation-split probabilities into a binary decision
//! rule: the precision-recall curve is computed over every distinct
//! predicted probability, and the chosen threshold is the qualifying point
//! (recall at or above the target) with the highest precision, ties broken
//! toward the lower threshold. An unreachable target is not an error; the
//! most permissive point is returned with an explicit flag.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One achievable operating point on the precision-recall curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvePoint {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
}

/// A calibrated decision threshold with the context it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdDecision {
    /// Probability cutoff: scores at or above it classify as fraud
    pub threshold: f64,
    /// Precision achieved at the threshold on the validation split
    pub precision: f64,
    /// Recall achieved at the threshold on the validation split
    pub recall: f64,
    /// Recall the selection was asked to reach
    pub target_recall: f64,
    /// Whether the target recall was actually reached
    pub target_met: bool,
    /// Validation-set size the decision was computed from
    pub validation_size: usize,
}

/// All achievable (threshold, precision, recall) triples, one per distinct
/// predicted probability, ordered by decreasing threshold.
pub fn precision_recall_curve(labels: &[u8], probabilities: &[f64]) -> Vec<CurvePoint> {
    debug_assert_eq!(labels.len(), probabilities.len());
    let total_positives = labels.iter().filter(|&&l| l == 1).count();
    if total_positives == 0 || labels.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut points = Vec::new();
    let mut true_positives = 0usize;
    let mut predicted_positives = 0usize;

    let mut i = 0;
    while i < order.len() {
        let threshold = probabilities[order[i]];
        // Consume the whole tied group before emitting a point.
        while i < order.len() && probabilities[order[i]] == threshold {
            predicted_positives += 1;
            if labels[order[i]] == 1 {
                true_positives += 1;
            }
            i += 1;
        }
        points.push(CurvePoint {
            threshold,
            precision: true_positives as f64 / predicted_positives as f64,
            recall: true_positives as f64 / total_positives as f64,
        });
    }
    points
}

/// Select the decision threshold for a target recall in (0, 1].
///
/// Among curve points meeting the recall floor, the highest-precision point
/// wins (lower threshold on ties). When no point reaches the target, the
/// most permissive threshold is returned with `target_met == false` and the
/// achieved precision/recall it yields, rather than failing silently.
pub fn select_threshold(
    labels: &[u8],
    probabilities: &[f64],
    target_recall: f64,
) -> PipelineResult<ThresholdDecision> {
    if !(target_recall > 0.0 && target_recall <= 1.0) {
        return Err(PipelineError::Configuration(format!(
            "target recall must be in (0, 1], got {}",
            target_recall
        )));
    }
    if labels.len() != probabilities.len() {
        return Err(PipelineError::Configuration(format!(
            "labels ({}) and probabilities ({}) are misaligned",
            labels.len(),
            probabilities.len()
        )));
    }

    let curve = precision_recall_curve(labels, probabilities);
    if curve.is_empty() {
        return Err(PipelineError::Training(
            "cannot select a threshold: validation split has no positive labels".to_string(),
        ));
    }

    let qualifying = curve
        .iter()
        .filter(|p| p.recall >= target_recall)
        .max_by(|a, b| {
            a.precision
                .partial_cmp(&b.precision)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Ties go to the lower threshold.
                .then_with(|| {
                    b.threshold
                        .partial_cmp(&a.threshold)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

    let (chosen, target_met) = match qualifying {
        Some(point) => (point, true),
        None => {
            // Most permissive available point: last on the curve.
            let fallback = &curve[curve.len() - 1];
            warn!(
                target_recall = target_recall,
                achieved_recall = fallback.recall,
                "Target recall unreachable; falling back to the most permissive threshold"
            );
            (fallback, false)
        }
    };

    Ok(ThresholdDecision {
        threshold: chosen.threshold,
        precision: chosen.precision,
        recall: chosen.recall,
        target_recall,
        target_met,
        validation_size: labels.len(),
    })
}
