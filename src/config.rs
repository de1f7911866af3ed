//! Configuration management for the fraud training pipeline

use crate::types::score::DriftBands;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Hyperparameter search strategy
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Exhaustive search over the full cartesian grid
    #[default]
    Grid,
    /// Randomized sampling of the grid with a fixed iteration budget
    Random,
}

/// Main pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub resample: ResampleConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub threshold: ThresholdConfig,
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Feature engineering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    /// Trailing window for velocity/frequency features, in seconds
    pub window_secs: u64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            // 24-hour trailing window
            window_secs: 24 * 3600,
        }
    }
}

/// Train/validation/test split configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    /// Fraction of records assigned to the training split
    pub train_frac: f64,
    /// Fraction of records assigned to the validation split
    pub valid_frac: f64,
    /// Shuffle seed for reproducible splits
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_frac: 0.6,
            valid_frac: 0.2,
            seed: 42,
        }
    }
}

/// Minority-class resampling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResampleConfig {
    /// Target minority-to-majority ratio after resampling (1.0 = balanced)
    pub target_ratio: f64,
    /// Number of nearest same-class neighbors considered for interpolation
    pub k_neighbors: usize,
    /// RNG seed for deterministic resampling
    pub seed: u64,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            target_ratio: 1.0,
            k_neighbors: 5,
            seed: 42,
        }
    }
}

/// Hyperparameter search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Number of stratified cross-validation folds
    pub folds: usize,
    /// Search strategy: "grid" (exhaustive) or "random" (budgeted sample)
    #[serde(default)]
    pub strategy: SearchStrategy,
    /// Iteration budget for the random strategy
    pub budget: usize,
    /// RNG seed for fold assignment and random sampling
    pub seed: u64,
    /// Candidate tree counts
    pub n_trees: Vec<usize>,
    /// Candidate learning rates
    pub learning_rate: Vec<f64>,
    /// Candidate maximum tree depths
    pub max_depth: Vec<usize>,
    /// Candidate row subsampling fractions
    pub subsample: Vec<f64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            strategy: SearchStrategy::Grid,
            budget: 10,
            seed: 42,
            n_trees: vec![50, 100],
            learning_rate: vec![0.1, 0.3],
            max_depth: vec![3, 5],
            subsample: vec![0.8],
        }
    }
}

/// Threshold selection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    /// Target recall the chosen decision threshold must reach
    pub target_recall: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { target_recall: 0.95 }
    }
}

/// Drift monitoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DriftConfig {
    /// Number of equal-width buckets for PSI and calibration
    pub bucket_count: usize,
    /// PSI guidance bands for drift severity reporting
    #[serde(default)]
    pub bands: DriftBands,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            bucket_count: 10,
            bands: DriftBands::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/pipeline.toml")
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            split: SplitConfig::default(),
            resample: ResampleConfig::default(),
            search: SearchConfig::default(),
            threshold: ThresholdConfig::default(),
            drift: DriftConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.features.window_secs, 24 * 3600);
        assert_eq!(config.search.folds, 5);
        assert_eq!(config.search.strategy, SearchStrategy::Grid);
        assert!((config.threshold.target_recall - 0.95).abs() < 1e-12);
        assert_eq!(config.drift.bucket_count, 10);
        assert!((config.resample.target_ratio - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(
            &path,
            r#"
[features]
window_secs = 3600

[search]
folds = 3
strategy = "random"
budget = 4
seed = 7
n_trees = [25]
learning_rate = [0.2]
max_depth = [3]
subsample = [1.0]

[threshold]
target_recall = 0.9
"#,
        )
        .unwrap();

        let config = PipelineConfig::load_from_path(&path).unwrap();
        assert_eq!(config.features.window_secs, 3600);
        assert_eq!(config.search.folds, 3);
        assert_eq!(config.search.strategy, SearchStrategy::Random);
        assert!((config.threshold.target_recall - 0.9).abs() < 1e-12);
        // Unspecified sections fall back to defaults
        assert_eq!(config.drift.bucket_count, 10);
    }
}
