//! Error types for the training and monitoring pipeline.

use thiserror::Error;

/// Errors surfaced by the core pipeline components.
///
/// All errors are local to the failing call; the pipeline performs no
/// automatic retries (training is deterministic given fixed seeds, so
/// retrying without changing input is pointless).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required fields are missing from the input data. Fails fast, no
    /// partial feature computation.
    #[error("missing required field(s): {}", fields.join(", "))]
    Schema { fields: Vec<String> },

    /// A feature column cannot be scaled or computed (empty or
    /// zero-variance input would otherwise silently produce NaN).
    #[error("feature error: {0}")]
    Feature(String),

    /// Model training failed, e.g. every hyperparameter candidate failed
    /// to fit. Partial results are never promoted as "the" best model.
    #[error("training error: {0}")]
    Training(String),

    /// A component was invoked with invalid or incomplete configuration,
    /// e.g. classification before a threshold has been set.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Convenience constructor for a single missing field.
    pub fn missing_field(field: &str) -> Self {
        PipelineError::Schema {
            fields: vec![field.to_string()],
        }
    }
}

/// Result alias used across the pipeline core.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
