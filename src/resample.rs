//! SMOTE-style minority oversampling.
//!
//! Synthesizes minority-class examples by interpolating between each base
//! sample and one of its nearest same-class neighbors in feature space.
//! Operates on the training split only; validation and test data must never
//! pass through here.

use crate::config::ResampleConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::dataset::{FeatureMatrix, TrainingDataset};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Minority-class resampler with a fixed seed for reproducibility.
#[derive(Debug, Clone)]
pub struct Resampler {
    target_ratio: f64,
    k_neighbors: usize,
    seed: u64,
}

impl Resampler {
    pub fn new(config: &ResampleConfig) -> PipelineResult<Self> {
        if config.target_ratio <= 0.0 || config.target_ratio > 1.0 {
            return Err(PipelineError::Configuration(format!(
                "resample target_ratio must be in (0, 1], got {}",
                config.target_ratio
            )));
        }
        if config.k_neighbors == 0 {
            return Err(PipelineError::Configuration(
                "resample k_neighbors must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            target_ratio: config.target_ratio,
            k_neighbors: config.k_neighbors,
            seed: config.seed,
        })
    }

    /// Oversample the minority class until it reaches
    /// `round(target_ratio * majority_count)` samples.
    ///
    /// Synthetic rows are appended after the originals. The input dataset's
    /// imbalance metadata is left untouched; the returned dataset carries
    /// its own post-resampling counts.
    pub fn oversample(&self, dataset: &TrainingDataset) -> PipelineResult<TrainingDataset> {
        let minority_label = if dataset.positive_count() <= dataset.negative_count() {
            1u8
        } else {
            0u8
        };
        let minority: Vec<usize> = (0..dataset.len())
            .filter(|&i| dataset.labels[i] == minority_label)
            .collect();
        let majority_count = dataset.len() - minority.len();

        if minority.is_empty() {
            return Err(PipelineError::Training(
                "cannot resample: minority class has no samples".to_string(),
            ));
        }

        let target = (self.target_ratio * majority_count as f64).round() as usize;
        if minority.len() >= target {
            return Ok(dataset.clone());
        }
        let needed = target - minority.len();

        // Nearest same-class neighbors per minority sample (Euclidean).
        let neighbors = nearest_neighbors(&dataset.features, &minority, self.k_neighbors);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut rows = dataset.features.rows.clone();
        let mut labels = dataset.labels.clone();

        for _ in 0..needed {
            let base_pos = rng.gen_range(0..minority.len());
            let base = &dataset.features.rows[minority[base_pos]];

            let synthetic = if neighbors[base_pos].is_empty() {
                // Single-sample minority class degenerates to duplication.
                base.clone()
            } else {
                let pick = rng.gen_range(0..neighbors[base_pos].len());
                let neighbor = &dataset.features.rows[neighbors[base_pos][pick]];
                let gap: f64 = rng.gen();
                base.iter()
                    .zip(neighbor.iter())
                    .map(|(b, n)| b + gap * (n - b))
                    .collect()
            };

            rows.push(synthetic);
            labels.push(minority_label);
        }

        info!(
            minority_before = minority.len(),
            minority_after = target,
            majority = majority_count,
            synthesized = needed,
            "Minority class oversampled"
        );

        let features = FeatureMatrix::new(dataset.features.feature_names.clone(), rows)?;
        TrainingDataset::new(features, labels)
    }
}

/// Indices (into the full matrix) of the `k` nearest minority neighbors of
/// each minority sample, excluding the sample itself.
fn nearest_neighbors(
    features: &FeatureMatrix,
    minority: &[usize],
    k: usize,
) -> Vec<Vec<usize>> {
    minority
        .iter()
        .map(|&i| {
            let mut distances: Vec<(f64, usize)> = minority
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (squared_distance(&features.rows[i], &features.rows[j]), j))
                .collect();
            distances
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            distances.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed_dataset(n_pos: usize, n_neg: usize) -> TrainingDataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_pos {
            rows.push(vec![10.0 + i as f64 * 0.1, 5.0]);
            labels.push(1u8);
        }
        for i in 0..n_neg {
            rows.push(vec![i as f64 * 0.01, 0.0]);
            labels.push(0u8);
        }
        let features =
            FeatureMatrix::new(vec!["x".to_string(), "y".to_string()], rows).unwrap();
        TrainingDataset::new(features, labels).unwrap()
    }

    fn resampler(target_ratio: f64, seed: u64) -> Resampler {
        Resampler::new(&ResampleConfig {
            target_ratio,
            k_neighbors: 5,
            seed,
        })
        .unwrap()
    }

    #[test]
    fn test_oversample_reaches_exact_balance() {
        let dataset = skewed_dataset(10, 200);
        let balanced = resampler(1.0, 42).oversample(&dataset).unwrap();

        let pos = balanced.labels.iter().filter(|&&l| l == 1).count();
        let neg = balanced.labels.iter().filter(|&&l| l == 0).count();
        assert!((pos as i64 - neg as i64).abs() <= 1);
    }

    #[test]
    fn test_oversample_partial_target_ratio() {
        let dataset = skewed_dataset(10, 200);
        let resampled = resampler(0.5, 42).oversample(&dataset).unwrap();

        let pos = resampled.labels.iter().filter(|&&l| l == 1).count();
        assert_eq!(pos, 100);
    }

    #[test]
    fn test_synthetic_rows_interpolate_minority_space() {
        let dataset = skewed_dataset(10, 50);
        let resampled = resampler(1.0, 42).oversample(&dataset).unwrap();

        // Every synthetic minority row lies within the minority bounding box.
        for (row, &label) in resampled.features.rows[60..]
            .iter()
            .zip(&resampled.labels[60..])
        {
            assert_eq!(label, 1);
            assert!(row[0] >= 10.0 && row[0] <= 10.9 + 1e-9);
            assert!((row[1] - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_oversample_is_deterministic_for_fixed_seed() {
        let dataset = skewed_dataset(8, 80);
        let a = resampler(1.0, 7).oversample(&dataset).unwrap();
        let b = resampler(1.0, 7).oversample(&dataset).unwrap();
        assert_eq!(a.features.rows, b.features.rows);

        let c = resampler(1.0, 8).oversample(&dataset).unwrap();
        assert_ne!(a.features.rows, c.features.rows);
    }

    #[test]
    fn test_already_balanced_dataset_untouched() {
        let dataset = skewed_dataset(50, 50);
        let resampled = resampler(1.0, 1).oversample(&dataset).unwrap();
        assert_eq!(resampled.len(), dataset.len());
    }

    #[test]
    fn test_single_minority_sample_duplicates() {
        let dataset = skewed_dataset(1, 10);
        let resampled = resampler(1.0, 3).oversample(&dataset).unwrap();
        let pos = resampled.labels.iter().filter(|&&l| l == 1).count();
        assert_eq!(pos, 10);
        for (row, &label) in resampled.features.rows.iter().zip(&resampled.labels) {
            if label == 1 {
                assert_eq!(row, &vec![10.0, 5.0]);
            }
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Resampler::new(&ResampleConfig {
            target_ratio: 0.0,
            k_neighbors: 5,
            seed: 1
        })
        .is_err());
        assert!(Resampler::new(&ResampleConfig {
            target_ratio: 1.0,
            k_neighbors: 0,
            seed: 1
        })
        .is_err());
    }
}
