//! Model training, hyperparameter search and artifact persistence

pub mod artifact;
pub mod booster;
pub mod search;

pub use artifact::ModelArtifact;
pub use booster::{BoosterConfig, GradientBoostedTrees};
pub use search::{CandidateResult, ModelSearch, SearchOutcome};
