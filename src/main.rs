//! Training pipeline entry point.
//!
//! Trains a fraud scoring model on synthetic labeled history, persists the
//! resulting artifact, and demonstrates drift monitoring against a shifted
//! traffic window.

use anyhow::Result;
use fraud_training_pipeline::config::PipelineConfig;
use fraud_training_pipeline::drift::{population_stability_index, DistributionSnapshot};
use fraud_training_pipeline::pipeline::TrainingPipeline;
use fraud_training_pipeline::scoring::InferenceWrapper;
use fraud_training_pipeline::synthetic;
use fraud_training_pipeline::types::DriftStatus;
use tracing::{info, warn};

fn main() -> Result<()> {
    let config = match PipelineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            init_logging(&PipelineConfig::default());
            warn!(error = %e, "No configuration file found, using defaults");
            PipelineConfig::default()
        }
    };
    init_logging(&config);

    info!("Starting fraud model training pipeline");

    // Labeled history at a realistic class imbalance.
    let records = synthetic::generate(10_000, 0.01, 42);
    info!(
        records = records.len(),
        fraud = records.iter().filter(|r| r.is_fraud()).count(),
        "Synthetic labeled history generated"
    );

    let outcome = TrainingPipeline::new(config.clone()).run(&records)?;
    outcome.artifact.save("artifacts/model.json")?;

    info!(
        threshold = outcome.threshold.threshold,
        precision = outcome.threshold.precision,
        recall = outcome.threshold.recall,
        target_met = outcome.threshold.target_met,
        test_auc = ?outcome.evaluation.auc,
        "Model trained and persisted"
    );

    // Score a drifted traffic window and compare it to the frozen training
    // baseline.
    let wrapper = InferenceWrapper::new(outcome.artifact);
    let drifted = synthetic::generate_drifted(2_000, 0.01, 43);
    let scores = wrapper.score(&drifted)?;

    let window = DistributionSnapshot::from_scores(&scores, config.drift.bucket_count)?;
    let psi = population_stability_index(&outcome.baseline, &window)?;
    let status = DriftStatus::from_psi(psi, &config.drift.bands);
    match status {
        DriftStatus::Stable => info!(psi = psi, "Score distribution stable"),
        DriftStatus::Mild => warn!(psi = psi, "Mild score drift detected"),
        DriftStatus::Significant => warn!(psi = psi, "Significant score drift detected"),
    }

    for bucket in &outcome.calibration.buckets {
        if let (Some(mean_probability), Some(observed_rate)) =
            (bucket.mean_probability, bucket.observed_rate)
        {
            info!(
                lower = bucket.lower,
                upper = bucket.upper,
                count = bucket.count,
                mean_probability = mean_probability,
                observed_rate = observed_rate,
                "Calibration bucket"
            );
        }
    }

    Ok(())
}

fn init_logging(config: &PipelineConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    if config.logging.format == "json" {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
