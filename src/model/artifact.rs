//! Persisted model bundles.
//!
//! An artifact carries everything needed to score raw transactions on a
//! fresh process: the fitted feature engineer, the scaler statistics, the
//! boosted ensemble, and the threshold decision. Loading an artifact never
//! requires access to the training data.

use crate::features::FeatureEngineer;
use crate::model::booster::GradientBoostedTrees;
use crate::scaler::StandardScaler;
use crate::threshold::ThresholdDecision;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// A self-contained, serializable model bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Unique artifact identifier
    pub artifact_id: Uuid,
    /// When the artifact was assembled
    pub created_at: DateTime<Utc>,
    /// Ordered feature names the model was trained on
    pub feature_names: Vec<String>,
    /// Fitted feature engineer (geo rates, device profiles, window)
    pub engineer: FeatureEngineer,
    /// Fitted z-score scaler
    pub scaler: StandardScaler,
    /// Trained boosted ensemble
    pub booster: GradientBoostedTrees,
    /// Decision threshold chosen on the validation split, when one was
    /// selected during training
    pub threshold: Option<ThresholdDecision>,
}

impl ModelArtifact {
    /// Assemble an artifact from fitted pipeline components.
    pub fn new(
        engineer: FeatureEngineer,
        scaler: StandardScaler,
        booster: GradientBoostedTrees,
        threshold: Option<ThresholdDecision>,
    ) -> Self {
        Self {
            artifact_id: Uuid::new_v4(),
            created_at: Utc::now(),
            feature_names: scaler.feature_names().to_vec(),
            engineer,
            scaler,
            booster,
            threshold,
        }
    }

    /// Persist the artifact as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create artifact directory {:?}", parent)
                })?;
            }
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize artifact")?;
        fs::write(path, json).with_context(|| format!("Failed to write artifact {:?}", path))?;

        info!(
            artifact_id = %self.artifact_id,
            path = ?path,
            trees = self.booster.tree_count(),
            "Model artifact saved"
        );
        Ok(())
    }

    /// Load an artifact previously written by `save`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {:?}", path))?;
        let artifact: Self =
            serde_json::from_str(&json).context("Failed to deserialize artifact")?;

        info!(
            artifact_id = %artifact.artifact_id,
            created_at = %artifact.created_at,
            path = ?path,
            "Model artifact loaded"
        );
        Ok(artifact)
    }
}
