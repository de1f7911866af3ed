//! Z-score feature standardization.
//!
//! Statistics are fit once on the training split and reused verbatim at
//! inference; `transform` never refits.

use crate::error::{PipelineError, PipelineResult};
use crate::types::dataset::FeatureMatrix;
use serde::{Deserialize, Serialize};

const MIN_VARIANCE: f64 = 1e-12;

/// Fitted z-score scaler: per-feature mean and standard deviation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-feature statistics on the training matrix.
    ///
    /// Empty input or a zero-variance column fails with a feature error
    /// rather than silently producing NaN outputs downstream.
    pub fn fit(matrix: &FeatureMatrix) -> PipelineResult<Self> {
        if matrix.is_empty() {
            return Err(PipelineError::Feature(
                "cannot fit scaler on an empty feature matrix".to_string(),
            ));
        }

        let n = matrix.len() as f64;
        let width = matrix.width();
        let mut means = vec![0.0; width];
        let mut stds = vec![0.0; width];

        for j in 0..width {
            let column = matrix.column(j);
            let mean = column.iter().sum::<f64>() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            if variance < MIN_VARIANCE {
                return Err(PipelineError::Feature(format!(
                    "zero-variance feature column '{}'",
                    matrix.feature_names[j]
                )));
            }
            means[j] = mean;
            stds[j] = variance.sqrt();
        }

        Ok(Self {
            feature_names: matrix.feature_names.clone(),
            means,
            stds,
        })
    }

    /// Apply the stored statistics to a matrix with the same feature order.
    pub fn transform(&self, matrix: &FeatureMatrix) -> PipelineResult<FeatureMatrix> {
        if matrix.feature_names != self.feature_names {
            return Err(PipelineError::Schema {
                fields: self
                    .feature_names
                    .iter()
                    .filter(|n| !matrix.feature_names.contains(n))
                    .cloned()
                    .collect(),
            });
        }

        let rows = matrix
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, v)| (v - self.means[j]) / self.stds[j])
                    .collect()
            })
            .collect();

        FeatureMatrix::new(self.feature_names.clone(), rows)
    }

    /// Feature ordering the scaler was fit with.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}
