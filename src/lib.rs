//! Imbalance-aware fraud model training, threshold selection and drift
//! monitoring.
//!
//! The crate trains a gradient-boosted scoring model from labeled
//! transaction history, picks a decision threshold under a recall
//! constraint, and ships the monitoring primitives (PSI, calibration)
//! needed to watch the deployed model's score distribution.

pub mod config;
pub mod drift;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod resample;
pub mod scaler;
pub mod scoring;
pub mod synthetic;
pub mod threshold;
pub mod types;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use features::FeatureEngineer;
pub use model::{GradientBoostedTrees, ModelArtifact, ModelSearch};
pub use pipeline::{TrainingOutcome, TrainingPipeline};
pub use resample::Resampler;
pub use scaler::StandardScaler;
pub use scoring::InferenceWrapper;
pub use threshold::{select_threshold, ThresholdDecision};
pub use types::{DriftBands, DriftStatus, ScoredTransaction, TrainingDataset, TransactionRecord};
