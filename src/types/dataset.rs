//! Feature matrices and labeled training datasets

use crate::error::{PipelineError, PipelineResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A fixed-order numeric feature matrix.
///
/// Invariant: feature set and ordering are identical between training and
/// inference; every row has exactly `feature_names.len()` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMatrix {
    /// Ordered feature names
    pub feature_names: Vec<String>,
    /// Row-major feature values, one row per record
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Create a matrix, checking row widths against the feature ordering.
    pub fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> PipelineResult<Self> {
        let width = feature_names.len();
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(PipelineError::Feature(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }
        Ok(Self {
            feature_names,
            rows,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    /// Values of a single column.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[index]).collect()
    }

    /// Select a subset of rows by index, keeping the feature ordering.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

/// A labeled dataset: feature matrix plus binary labels and class metadata.
///
/// The imbalance ratio is computed once at construction, before any
/// resampling, and is never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub features: FeatureMatrix,
    pub labels: Vec<u8>,
    positive_count: usize,
    negative_count: usize,
    imbalance_ratio: f64,
}

impl TrainingDataset {
    /// Build a dataset from a matrix and aligned labels.
    pub fn new(features: FeatureMatrix, labels: Vec<u8>) -> PipelineResult<Self> {
        if features.len() != labels.len() {
            return Err(PipelineError::Feature(format!(
                "feature rows ({}) and labels ({}) are misaligned",
                features.len(),
                labels.len()
            )));
        }
        let positive_count = labels.iter().filter(|&&l| l == 1).count();
        let negative_count = labels.len() - positive_count;
        let imbalance_ratio = if negative_count > 0 {
            positive_count as f64 / negative_count as f64
        } else {
            f64::INFINITY
        };
        Ok(Self {
            features,
            labels,
            positive_count,
            negative_count,
            imbalance_ratio,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Positive (fraud) sample count at construction time.
    pub fn positive_count(&self) -> usize {
        self.positive_count
    }

    /// Negative (legitimate) sample count at construction time.
    pub fn negative_count(&self) -> usize {
        self.negative_count
    }

    /// Positive-to-negative ratio as computed at construction.
    pub fn imbalance_ratio(&self) -> f64 {
        self.imbalance_ratio
    }

    /// Dataset restricted to the given row indices. Class metadata is
    /// recomputed for the subset.
    pub fn select(&self, indices: &[usize]) -> PipelineResult<Self> {
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        Self::new(self.features.select(indices), labels)
    }

    /// Split into train/validation/test partitions, preserving the class
    /// ratio within each partition.
    ///
    /// `train_frac` and `valid_frac` are fractions of the whole dataset;
    /// the remainder becomes the test partition. Assignment is shuffled
    /// with a seeded RNG per class, so splits are reproducible.
    pub fn stratified_split(
        &self,
        train_frac: f64,
        valid_frac: f64,
        seed: u64,
    ) -> PipelineResult<(Self, Self, Self)> {
        if !(train_frac > 0.0 && valid_frac > 0.0 && train_frac + valid_frac < 1.0) {
            return Err(PipelineError::Configuration(format!(
                "invalid split fractions: train={}, valid={}",
                train_frac, valid_frac
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut valid = Vec::new();
        let mut test = Vec::new();

        for class in [0u8, 1u8] {
            let mut indices: Vec<usize> = (0..self.labels.len())
                .filter(|&i| self.labels[i] == class)
                .collect();
            indices.shuffle(&mut rng);

            let n = indices.len();
            let n_train = (n as f64 * train_frac).round() as usize;
            let n_valid = (n as f64 * valid_frac).round() as usize;
            let n_train = n_train.min(n);
            let n_valid = n_valid.min(n - n_train);

            train.extend_from_slice(&indices[..n_train]);
            valid.extend_from_slice(&indices[n_train..n_train + n_valid]);
            test.extend_from_slice(&indices[n_train + n_valid..]);
        }

        // Stable row order within each partition.
        train.sort_unstable();
        valid.sort_unstable();
        test.sort_unstable();

        Ok((
            self.select(&train)?,
            self.select(&valid)?,
            self.select(&test)?,
        ))
    }
}
