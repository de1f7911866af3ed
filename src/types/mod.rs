//! Core data types for the training and monitoring pipeline

pub mod dataset;
pub mod score;
pub mod transaction;

pub use dataset::{FeatureMatrix, TrainingDataset};
pub use score::{DriftBands, DriftStatus, ScoredTransaction};
pub use transaction::TransactionRecord;
