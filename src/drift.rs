//! Drift monitoring: population stability and calibration.
//!
//! Both metrics are pure functions over immutable inputs. A
//! `DistributionSnapshot` captures one window's histogram; PSI compares a
//! frozen baseline snapshot ("expected") against a live window ("actual").
//! The comparison is not symmetric, so the two roles must never be swapped.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Smoothing constant keeping empty buckets out of the logarithm.
const PSI_EPSILON: f64 = 1e-6;

/// An immutable histogram over a bounded value range.
///
/// Built once from a window of observations; two snapshots are compared,
/// never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSnapshot {
    /// Bucket edges, `bucket_count + 1` ascending values
    pub edges: Vec<f64>,
    /// Fraction of observations per bucket, summing to 1 for non-empty input
    pub densities: Vec<f64>,
    /// Number of observations the snapshot was built from
    pub sample_count: usize,
}

impl DistributionSnapshot {
    /// Snapshot of model scores over the canonical [0, 1] range.
    pub fn from_scores(scores: &[f64], bucket_count: usize) -> PipelineResult<Self> {
        Self::from_values(scores, 0.0, 1.0, bucket_count)
    }

    /// Snapshot over an explicit `[lo, hi]` range, for callers monitoring
    /// raw feature distributions rather than scores. Out-of-range values
    /// clamp into the edge buckets.
    pub fn from_values(
        values: &[f64],
        lo: f64,
        hi: f64,
        bucket_count: usize,
    ) -> PipelineResult<Self> {
        if bucket_count == 0 {
            return Err(PipelineError::Configuration(
                "snapshot bucket_count must be at least 1".to_string(),
            ));
        }
        if !(hi > lo) {
            return Err(PipelineError::Configuration(format!(
                "invalid snapshot range [{}, {}]",
                lo, hi
            )));
        }
        if values.is_empty() {
            return Err(PipelineError::Feature(
                "cannot snapshot an empty distribution".to_string(),
            ));
        }

        let width = (hi - lo) / bucket_count as f64;
        let edges: Vec<f64> = (0..=bucket_count)
            .map(|i| lo + i as f64 * width)
            .collect();

        let mut counts = vec![0usize; bucket_count];
        for &value in values {
            counts[bucket_index(value, lo, width, bucket_count)] += 1;
        }

        let n = values.len() as f64;
        Ok(Self {
            edges,
            densities: counts.into_iter().map(|c| c as f64 / n).collect(),
            sample_count: values.len(),
        })
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.densities.len()
    }
}

/// Population Stability Index between a frozen baseline (`expected`) and a
/// comparison window (`actual`).
///
/// Σ (actual − expected) · ln((actual + ε) / (expected + ε)) over buckets,
/// with ε applied to both numerator and denominator so empty buckets never
/// divide by zero or take log of zero. Identical snapshots give exactly
/// 0.0. Interpretation guidance (not enforced here): near 0 = stable,
/// above 0.1 = mild drift, above 0.25 = significant drift.
pub fn population_stability_index(
    expected: &DistributionSnapshot,
    actual: &DistributionSnapshot,
) -> PipelineResult<f64> {
    if expected.bucket_count() != actual.bucket_count() || expected.edges != actual.edges {
        return Err(PipelineError::Configuration(format!(
            "snapshot shapes differ: expected {} buckets, actual {}",
            expected.bucket_count(),
            actual.bucket_count()
        )));
    }

    let psi = expected
        .densities
        .iter()
        .zip(actual.densities.iter())
        .map(|(&e, &a)| (a - e) * ((a + PSI_EPSILON) / (e + PSI_EPSILON)).ln())
        .sum();
    Ok(psi)
}

/// Convenience: snapshot two score windows over [0, 1] and compare them.
pub fn psi_from_scores(
    expected_scores: &[f64],
    actual_scores: &[f64],
    bucket_count: usize,
) -> PipelineResult<f64> {
    let expected = DistributionSnapshot::from_scores(expected_scores, bucket_count)?;
    let actual = DistributionSnapshot::from_scores(actual_scores, bucket_count)?;
    population_stability_index(&expected, &actual)
}

/// One probability bucket of a calibration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationBucket {
    /// Inclusive lower edge
    pub lower: f64,
    /// Upper edge (inclusive only for the last bucket)
    pub upper: f64,
    /// Samples assigned to the bucket
    pub count: usize,
    /// Mean predicted probability within the bucket
    pub mean_probability: Option<f64>,
    /// Observed positive rate within the bucket; `None` marks an empty
    /// bucket rather than pretending a rate exists
    pub observed_rate: Option<f64>,
}

/// Per-bucket observed positive rate vs. predicted probability.
///
/// Equal-width buckets over [0, 1] (fixed policy). A well-calibrated model
/// has observed rates near each bucket's midpoint; interpretation is left
/// to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationTable {
    pub buckets: Vec<CalibrationBucket>,
}

/// Build the calibration table for labeled predictions.
pub fn calibration_table(
    labels: &[u8],
    probabilities: &[f64],
    bucket_count: usize,
) -> PipelineResult<CalibrationTable> {
    if bucket_count == 0 {
        return Err(PipelineError::Configuration(
            "calibration bucket_count must be at least 1".to_string(),
        ));
    }
    if labels.len() != probabilities.len() {
        return Err(PipelineError::Configuration(format!(
            "labels ({}) and probabilities ({}) are misaligned",
            labels.len(),
            probabilities.len()
        )));
    }

    let width = 1.0 / bucket_count as f64;
    let mut counts = vec![0usize; bucket_count];
    let mut label_sums = vec![0.0f64; bucket_count];
    let mut prob_sums = vec![0.0f64; bucket_count];

    for (&label, &prob) in labels.iter().zip(probabilities.iter()) {
        let bucket = bucket_index(prob, 0.0, width, bucket_count);
        counts[bucket] += 1;
        label_sums[bucket] += label as f64;
        prob_sums[bucket] += prob;
    }

    let buckets = (0..bucket_count)
        .map(|i| CalibrationBucket {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            count: counts[i],
            mean_probability: (counts[i] > 0).then(|| prob_sums[i] / counts[i] as f64),
            observed_rate: (counts[i] > 0).then(|| label_sums[i] / counts[i] as f64),
        })
        .collect();

    Ok(CalibrationTable { buckets })
}

/// Equal-width bucket assignment; the top edge belongs to the last bucket
/// and out-of-range values clamp into the end buckets.
fn bucket_index(value: f64, lo: f64, width: f64, bucket_count: usize) -> usize {
    let raw = ((value - lo) / width).floor();
    if raw < 0.0 {
        0
    } else {
        (raw as usize).min(bucket_count - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psi_of_identical_distribution_is_exactly_zero() {
        let scores = vec![0.1, 0.2, 0.2, 0.5, 0.7, 0.95];
        let snapshot = DistributionSnapshot::from_scores(&scores, 10).unwrap();
        let psi = population_stability_index(&snapshot, &snapshot).unwrap();
        assert_eq!(psi, 0.0);
    }

    #[test]
    fn test_psi_detects_a_shifted_distribution() {
        let expected: Vec<f64> = (0..1000).map(|i| (i % 100) as f64 / 100.0).collect();
        let shifted: Vec<f64> = expected.iter().map(|v| (v * 0.3 + 0.6).min(1.0)).collect();
        let psi = psi_from_scores(&expected, &shifted, 10).unwrap();
        assert!(psi > 0.25, "shifted distribution should flag drift, psi={}", psi);
    }

    #[test]
    fn test_psi_is_not_symmetric() {
        let a: Vec<f64> = (0..500).map(|i| (i % 10) as f64 / 10.0).collect();
        let b: Vec<f64> = (0..500).map(|i| ((i % 10) as f64 / 10.0).powi(2)).collect();
        let forward = psi_from_scores(&a, &b, 10).unwrap();
        let backward = psi_from_scores(&b, &a, 10).unwrap();
        assert!((forward - backward).abs() > 1e-6);
    }

    #[test]
    fn test_psi_survives_empty_buckets() {
        // Expected concentrates low, actual concentrates high: most buckets
        // are empty on one side.
        let expected = vec![0.05; 100];
        let actual = vec![0.95; 100];
        let psi = psi_from_scores(&expected, &actual, 10).unwrap();
        assert!(psi.is_finite());
        assert!(psi > 0.25);
    }

    #[test]
    fn test_psi_rejects_mismatched_snapshots() {
        let a = DistributionSnapshot::from_scores(&[0.5, 0.6], 10).unwrap();
        let b = DistributionSnapshot::from_scores(&[0.5, 0.6], 5).unwrap();
        assert!(population_stability_index(&a, &b).is_err());
    }

    #[test]
    fn test_snapshot_densities_sum_to_one() {
        let scores = vec![0.0, 0.15, 0.5, 0.99, 1.0];
        let snapshot = DistributionSnapshot::from_scores(&scores, 4).unwrap();
        assert_eq!(snapshot.edges.len(), 5);
        assert!((snapshot.densities.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        // 1.0 belongs to the last bucket, not a phantom overflow bucket.
        assert!(snapshot.densities[3] > 0.0);
    }

    #[test]
    fn test_snapshot_clamps_out_of_range_feature_values() {
        let values = vec![-5.0, 0.5, 12.0];
        let snapshot = DistributionSnapshot::from_values(&values, 0.0, 10.0, 5).unwrap();
        assert!((snapshot.densities[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((snapshot.densities[4] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_rejects_degenerate_input() {
        assert!(DistributionSnapshot::from_scores(&[], 10).is_err());
        assert!(DistributionSnapshot::from_scores(&[0.5], 0).is_err());
        assert!(DistributionSnapshot::from_values(&[0.5], 1.0, 1.0, 5).is_err());
    }

    #[test]
    fn test_calibration_table_observed_rates() {
        let labels = vec![0, 0, 1, 0, 1, 1];
        let probs = vec![0.05, 0.15, 0.18, 0.55, 0.65, 0.95];
        let table = calibration_table(&labels, &probs, 10).unwrap();

        assert_eq!(table.buckets.len(), 10);
        // Bucket [0.1, 0.2): one negative, one positive.
        assert_eq!(table.buckets[1].count, 2);
        assert_eq!(table.buckets[1].observed_rate, Some(0.5));
        // Bucket [0.9, 1.0]: one positive.
        assert_eq!(table.buckets[9].observed_rate, Some(1.0));
    }

    #[test]
    fn test_calibration_empty_buckets_are_marked_not_faked() {
        let labels = vec![1, 0];
        let probs = vec![0.95, 0.05];
        let table = calibration_table(&labels, &probs, 10).unwrap();
        for bucket in &table.buckets[1..9] {
            assert_eq!(bucket.count, 0);
            assert_eq!(bucket.observed_rate, None);
            assert_eq!(bucket.mean_probability, None);
        }
    }

    #[test]
    fn test_calibration_of_perfectly_calibrated_scores() {
        // Scores equal to empirical rates per bucket.
        let mut labels = Vec::new();
        let mut probs = Vec::new();
        for i in 0..10 {
            let p = (i as f64 + 0.5) / 10.0;
            for j in 0..100 {
                probs.push(p);
                labels.push(u8::from((j as f64) < p * 100.0));
            }
        }
        let table = calibration_table(&labels, &probs, 10).unwrap();
        for bucket in &table.buckets {
            let rate = bucket.observed_rate.unwrap();
            let midpoint = (bucket.lower + bucket.upper) / 2.0;
            assert!((rate - midpoint).abs() < 0.01);
        }
    }
}
