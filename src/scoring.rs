//! Batch scoring over a persisted model artifact.
//!
//! Applies the exact transformations learned at training time: the fitted
//! feature engineer, the stored scaler statistics, and the boosted ensemble.
//! Nothing here refits anything.

use crate::error::{PipelineError, PipelineResult};
use crate::model::ModelArtifact;
use crate::threshold::ThresholdDecision;
use crate::types::score::ScoredTransaction;
use crate::types::transaction::TransactionRecord;
use tracing::debug;

/// Scoring front-end over a model artifact.
pub struct InferenceWrapper {
    artifact: ModelArtifact,
}

impl InferenceWrapper {
    /// Wrap an artifact for scoring.
    pub fn new(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    /// The wrapped artifact.
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// The threshold decision stored in the artifact, if any.
    pub fn threshold(&self) -> Option<&ThresholdDecision> {
        self.artifact.threshold.as_ref()
    }

    /// Fraud probability per record, in input order.
    ///
    /// Window features are computed within the given batch; geo risk and
    /// device similarity come from the aggregates frozen at fit time.
    pub fn score(&self, records: &[TransactionRecord]) -> PipelineResult<Vec<f64>> {
        let raw = self.artifact.engineer.transform(records)?;
        let scaled = self.artifact.scaler.transform(&raw)?;
        let probabilities = self.artifact.booster.predict_proba(&scaled.rows);

        debug!(records = records.len(), "Batch scored");
        Ok(probabilities)
    }

    /// Binary fraud decision per record: probability at or above the stored
    /// threshold classifies as fraud.
    ///
    /// Fails when the artifact carries no threshold decision; classification
    /// without a calibrated cutoff would silently pick an arbitrary one.
    pub fn classify(&self, records: &[TransactionRecord]) -> PipelineResult<Vec<u8>> {
        let decision = self.artifact.threshold.as_ref().ok_or_else(|| {
            PipelineError::Configuration(
                "cannot classify: artifact has no threshold decision".to_string(),
            )
        })?;

        let probabilities = self.score(records)?;
        Ok(probabilities
            .iter()
            .map(|&p| u8::from(p >= decision.threshold))
            .collect())
    }

    /// Score a batch into monitoring/export rows, carrying each record's
    /// label through when present.
    pub fn score_report(
        &self,
        records: &[TransactionRecord],
    ) -> PipelineResult<Vec<ScoredTransaction>> {
        let probabilities = self.score(records)?;
        Ok(records
            .iter()
            .zip(probabilities)
            .map(|(record, probability)| ScoredTransaction {
                transaction_id: record.transaction_id.clone(),
                probability,
                label: record.label,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::TrainingPipeline;
    use crate::synthetic;

    fn small_trained_wrapper() -> (InferenceWrapper, Vec<TransactionRecord>) {
        let records = synthetic::generate(600, 0.08, 42);
        let mut config = PipelineConfig::default();
        config.search.folds = 3;
        config.search.n_trees = vec![15];
        config.search.learning_rate = vec![0.3];
        config.search.max_depth = vec![3];
        config.search.subsample = vec![1.0];

        let outcome = TrainingPipeline::new(config).run(&records).unwrap();
        (InferenceWrapper::new(outcome.artifact), records)
    }

    #[test]
    fn test_score_returns_probabilities_in_unit_interval() {
        let (wrapper, records) = small_trained_wrapper();
        let unlabeled: Vec<TransactionRecord> = records[..50]
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.label = None;
                r
            })
            .collect();

        let probabilities = wrapper.score(&unlabeled).unwrap();
        assert_eq!(probabilities.len(), 50);
        for p in probabilities {
            assert!(p > 0.0 && p < 1.0);
        }
    }

    #[test]
    fn test_classify_applies_stored_threshold() {
        let (wrapper, records) = small_trained_wrapper();
        let threshold = wrapper.threshold().unwrap().threshold;

        let probabilities = wrapper.score(&records[..100]).unwrap();
        let decisions = wrapper.classify(&records[..100]).unwrap();
        for (p, d) in probabilities.iter().zip(decisions.iter()) {
            assert_eq!(*d, u8::from(*p >= threshold));
        }
    }

    #[test]
    fn test_classify_without_threshold_fails() {
        let (wrapper, records) = small_trained_wrapper();
        let mut artifact = wrapper.artifact().clone();
        artifact.threshold = None;

        let bare = InferenceWrapper::new(artifact);
        let err = bare.classify(&records[..10]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_score_report_carries_labels_through() {
        let (wrapper, records) = small_trained_wrapper();
        let rows = wrapper.score_report(&records[..20]).unwrap();

        assert_eq!(rows.len(), 20);
        for (row, record) in rows.iter().zip(&records[..20]) {
            assert_eq!(row.transaction_id, record.transaction_id);
            assert_eq!(row.label, record.label);
        }
    }
}
