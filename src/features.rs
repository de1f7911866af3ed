//! Feature engineering for fraud risk scoring.
//!
//! Derives risk-relevant numeric features from raw transaction records:
//! time-windowed velocity/frequency per actor, per-country historical fraud
//! rate, and device-fingerprint similarity. Aggregate state (geo rates,
//! device usage profiles) is fit once on labeled training history and
//! reused verbatim at inference.

use crate::error::{PipelineError, PipelineResult};
use crate::types::dataset::FeatureMatrix;
use crate::types::transaction::TransactionRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Names of the engineered features, in output order.
const FEATURE_NAMES: [&str; 6] = [
    "amount",
    "hour_of_day",
    "account_frequency_window",
    "account_velocity_window",
    "geo_risk",
    "device_similarity",
];

/// Stateful feature engineer.
///
/// `fit` learns aggregate statistics from the full labeled history;
/// `transform` derives one fixed-order feature row per record. The fitted
/// state is serializable so it can ride inside a persisted model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEngineer {
    /// Trailing window for frequency/velocity features, in seconds
    window_secs: i64,
    /// Per-country historical fraud rate
    geo_rates: BTreeMap<String, f64>,
    /// Global fraud rate, the default for countries unseen during fit
    global_fraud_rate: f64,
    /// Per-actor frequency-normalized device usage vectors
    device_profiles: BTreeMap<String, BTreeMap<String, f64>>,
    fitted: bool,
}

impl FeatureEngineer {
    /// Create an unfitted engineer with the given trailing window.
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs: window_secs as i64,
            geo_rates: BTreeMap::new(),
            global_fraud_rate: 0.0,
            device_profiles: BTreeMap::new(),
            fitted: false,
        }
    }

    /// Ordered feature names. Identical between training and inference.
    pub fn feature_names(&self) -> Vec<String> {
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }

    /// Number of features produced per record.
    pub fn feature_count(&self) -> usize {
        FEATURE_NAMES.len()
    }

    /// Whether `fit` has been called.
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Fit aggregate statistics on labeled history.
    ///
    /// Every record must carry a fraud label; missing labels fail fast
    /// with a schema error rather than computing partial aggregates.
    pub fn fit(&mut self, records: &[TransactionRecord]) -> PipelineResult<()> {
        if records.is_empty() {
            return Err(PipelineError::Feature(
                "cannot fit feature engineer on an empty record set".to_string(),
            ));
        }
        if records.iter().any(|r| r.label.is_none()) {
            return Err(PipelineError::missing_field("label"));
        }

        // Per-country fraud rate over the whole labeled history.
        let mut geo_totals: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        let mut fraud_total = 0u64;
        for record in records {
            let entry = geo_totals.entry(record.country.clone()).or_insert((0, 0));
            entry.1 += 1;
            if record.is_fraud() {
                entry.0 += 1;
                fraud_total += 1;
            }
        }
        self.global_fraud_rate = fraud_total as f64 / records.len() as f64;
        self.geo_rates = geo_totals
            .into_iter()
            .map(|(country, (fraud, total))| (country, fraud as f64 / total as f64))
            .collect();

        // Per-actor device usage counts, normalized to frequencies.
        let mut usage: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for record in records {
            *usage
                .entry(record.account_id.clone())
                .or_default()
                .entry(record.device_fingerprint.clone())
                .or_insert(0.0) += 1.0;
        }
        for devices in usage.values_mut() {
            let total: f64 = devices.values().sum();
            for count in devices.values_mut() {
                *count /= total;
            }
        }
        self.device_profiles = usage;
        self.fitted = true;

        debug!(
            countries = self.geo_rates.len(),
            actors = self.device_profiles.len(),
            global_fraud_rate = self.global_fraud_rate,
            "Feature engineer fitted"
        );
        Ok(())
    }

    /// Derive the fixed-order feature matrix for a batch of records.
    ///
    /// Window features are computed over the given batch; geo risk and
    /// device similarity use the aggregates learned during `fit`.
    pub fn transform(&self, records: &[TransactionRecord]) -> PipelineResult<FeatureMatrix> {
        if !self.fitted {
            return Err(PipelineError::Configuration(
                "feature engineer used before fit".to_string(),
            ));
        }

        let window = self.sliding_window_stats(records);
        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let (frequency, velocity) = window[i];
            rows.push(vec![
                record.amount,
                hour_of_day(record),
                frequency as f64,
                velocity,
                self.geo_risk(&record.country),
                self.device_similarity(&record.account_id, &record.device_fingerprint),
            ]);
        }

        FeatureMatrix::new(self.feature_names(), rows)
    }

    /// Fit on labeled history and transform it in one step.
    pub fn fit_transform(
        &mut self,
        records: &[TransactionRecord],
    ) -> PipelineResult<FeatureMatrix> {
        self.fit(records)?;
        self.transform(records)
    }

    /// Per-record (frequency, velocity) over a trailing window ending at
    /// each record's timestamp.
    ///
    /// The window covers `[t - window_secs, t]`: strictly-future events are
    /// excluded, same-timestamp events and the record itself are included,
    /// so the first event of an actor has frequency 1 and velocity equal to
    /// its own amount. Results are independent of input ordering.
    fn sliding_window_stats(&self, records: &[TransactionRecord]) -> Vec<(usize, f64)> {
        // Group record indices per actor.
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, record) in records.iter().enumerate() {
            groups.entry(record.account_id.as_str()).or_default().push(i);
        }

        let mut out = vec![(0usize, 0.0f64); records.len()];
        for indices in groups.values() {
            // Sort the group's events by time; ties keep a stable order but
            // do not affect the result because the window is timestamp-based.
            let mut events: Vec<(i64, f64, usize)> = indices
                .iter()
                .map(|&i| {
                    (
                        records[i].timestamp.timestamp(),
                        records[i].amount,
                        i,
                    )
                })
                .collect();
            events.sort_by_key(|&(ts, _, i)| (ts, i));

            let times: Vec<i64> = events.iter().map(|e| e.0).collect();
            let mut prefix = vec![0.0f64; events.len() + 1];
            for (j, event) in events.iter().enumerate() {
                prefix[j + 1] = prefix[j] + event.1;
            }

            for &(ts, _, orig) in &events {
                let hi = times.partition_point(|&t| t <= ts);
                let lo = times.partition_point(|&t| t < ts - self.window_secs);
                out[orig] = (hi - lo, prefix[hi] - prefix[lo]);
            }
        }
        out
    }

    /// Historical fraud rate for a country; unseen countries map to the
    /// global fraud rate rather than a missing value.
    fn geo_risk(&self, country: &str) -> f64 {
        self.geo_rates
            .get(country)
            .copied()
            .unwrap_or(self.global_fraud_rate)
    }

    /// Cosine similarity between the record's device indicator vector and
    /// the actor's historical usage vector. Zero-vector cases (unseen actor
    /// or unseen device) are 0.0 by convention.
    fn device_similarity(&self, account_id: &str, device: &str) -> f64 {
        let Some(profile) = self.device_profiles.get(account_id) else {
            return 0.0;
        };
        let Some(&weight) = profile.get(device) else {
            return 0.0;
        };
        let norm: f64 = profile.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return 0.0;
        }
        weight / norm
    }
}

fn hour_of_day(record: &TransactionRecord) -> f64 {
    use chrono::Timelike;
    record.timestamp.hour() as f64
}
