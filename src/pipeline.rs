//! End-to-end training orchestration.
//!
//! Runs the full sequence over labeled history: feature engineering,
//! stratified splitting, scaling, minority oversampling, cross-validated
//! hyperparameter search, final refit, threshold selection on the
//! validation split, and held-out test evaluation. Only the training split
//! is ever resampled; validation and test stay at the natural class ratio.

use crate::config::PipelineConfig;
use crate::drift::{calibration_table, CalibrationTable, DistributionSnapshot};
use crate::error::{PipelineError, PipelineResult};
use crate::features::FeatureEngineer;
use crate::model::{GradientBoostedTrees, ModelArtifact, ModelSearch, SearchOutcome};
use crate::resample::Resampler;
use crate::scaler::StandardScaler;
use crate::threshold::{select_threshold, ThresholdDecision};
use crate::types::dataset::TrainingDataset;
use crate::types::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Held-out test metrics at the selected threshold.
///
/// Metrics that are undefined for the split (no positives, or no predicted
/// positives) are `None` rather than a fabricated number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEvaluation {
    /// Ranking quality over the test split
    pub auc: Option<f64>,
    /// Precision at the selected threshold
    pub precision: Option<f64>,
    /// Recall at the selected threshold
    pub recall: Option<f64>,
    /// Test split size
    pub sample_count: usize,
}

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Persistable model bundle (engineer, scaler, booster, threshold)
    pub artifact: ModelArtifact,
    /// Threshold decision made on the validation split
    pub threshold: ThresholdDecision,
    /// Hyperparameter search summary
    pub search: SearchOutcome,
    /// Held-out test metrics
    pub evaluation: TestEvaluation,
    /// Training-score distribution, the frozen baseline for PSI monitoring
    pub baseline: DistributionSnapshot,
    /// Calibration table over the test split
    pub calibration: CalibrationTable,
}

/// The training pipeline, configured once and run over labeled history.
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Train a scoring model from labeled transaction history.
    pub fn run(&self, records: &[TransactionRecord]) -> PipelineResult<TrainingOutcome> {
        if records.is_empty() {
            return Err(PipelineError::Feature(
                "cannot train on an empty record set".to_string(),
            ));
        }

        // Feature engineering over the full labeled history.
        let mut engineer = FeatureEngineer::new(self.config.features.window_secs);
        let matrix = engineer.fit_transform(records)?;
        let labels: Vec<u8> = records.iter().map(|r| u8::from(r.is_fraud())).collect();
        let dataset = TrainingDataset::new(matrix, labels)?;
        info!(
            records = dataset.len(),
            positives = dataset.positive_count(),
            negatives = dataset.negative_count(),
            imbalance_ratio = dataset.imbalance_ratio(),
            "Features engineered"
        );

        // Stratified split, then scaling statistics from the training split
        // only.
        let (train, valid, test) = dataset.stratified_split(
            self.config.split.train_frac,
            self.config.split.valid_frac,
            self.config.split.seed,
        )?;
        info!(
            train = train.len(),
            valid = valid.len(),
            test = test.len(),
            "Dataset split"
        );

        let scaler = StandardScaler::fit(&train.features)?;
        let train_scaled = scaler.transform(&train.features)?;
        let valid_scaled = scaler.transform(&valid.features)?;
        let test_scaled = scaler.transform(&test.features)?;

        // Oversample the training split only.
        let train_dataset = TrainingDataset::new(train_scaled.clone(), train.labels.clone())?;
        let resampled = Resampler::new(&self.config.resample)?.oversample(&train_dataset)?;

        // Cross-validated search, then a final refit of the winner on the
        // whole resampled training split.
        let search = ModelSearch::new(self.config.search.clone()).run(&resampled)?;
        let booster = GradientBoostedTrees::fit(
            &search.best.config,
            &resampled.features.rows,
            &resampled.labels,
        )?;
        info!(
            trees = booster.tree_count(),
            mean_cv_auc = search.best.mean_auc,
            "Final model fitted"
        );

        // Threshold from the untouched validation split.
        let valid_probs = booster.predict_proba(&valid_scaled.rows);
        let threshold = select_threshold(
            &valid.labels,
            &valid_probs,
            self.config.threshold.target_recall,
        )?;
        if !threshold.target_met {
            warn!(
                target_recall = threshold.target_recall,
                achieved_recall = threshold.recall,
                "Selected threshold does not reach the target recall"
            );
        }
        info!(
            threshold = threshold.threshold,
            precision = threshold.precision,
            recall = threshold.recall,
            "Decision threshold selected"
        );

        // Held-out test metrics and monitoring baselines.
        let test_probs = booster.predict_proba(&test_scaled.rows);
        let evaluation = evaluate_at_threshold(&test.labels, &test_probs, threshold.threshold);
        info!(
            test_auc = ?evaluation.auc,
            test_precision = ?evaluation.precision,
            test_recall = ?evaluation.recall,
            "Test split evaluated"
        );

        let train_probs = booster.predict_proba(&train_scaled.rows);
        let baseline =
            DistributionSnapshot::from_scores(&train_probs, self.config.drift.bucket_count)?;
        let calibration =
            calibration_table(&test.labels, &test_probs, self.config.drift.bucket_count)?;

        let artifact = ModelArtifact::new(engineer, scaler, booster, Some(threshold.clone()));
        info!(artifact_id = %artifact.artifact_id, "Training run complete");

        Ok(TrainingOutcome {
            artifact,
            threshold,
            search,
            evaluation,
            baseline,
            calibration,
        })
    }
}

/// Ranking and threshold metrics over one labeled split.
pub fn evaluate_at_threshold(labels: &[u8], probabilities: &[f64], cut: f64) -> TestEvaluation {
    let mut true_positives = 0usize;
    let mut predicted_positives = 0usize;
    let mut positives = 0usize;
    for (&label, &p) in labels.iter().zip(probabilities.iter()) {
        let predicted = p >= cut;
        if predicted {
            predicted_positives += 1;
        }
        if label == 1 {
            positives += 1;
            if predicted {
                true_positives += 1;
            }
        }
    }

    TestEvaluation {
        auc: crate::model::search::roc_auc(labels, probabilities),
        precision: (predicted_positives > 0)
            .then(|| true_positives as f64 / predicted_positives as f64),
        recall: (positives > 0).then(|| true_positives as f64 / positives as f64),
        sample_count: labels.len(),
    }
}
