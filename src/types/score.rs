//! Scored output rows and drift status bands

use serde::{Deserialize, Serialize};

/// One scored transaction, the monitoring/export row shape: identifier,
/// predicted probability, and the true label when available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTransaction {
    /// Associated transaction ID
    pub transaction_id: String,

    /// Predicted fraud probability (0.0 - 1.0)
    pub probability: f64,

    /// True label, when known
    pub label: Option<u8>,
}

/// Drift severity band derived from a PSI value.
///
/// The conventional interpretation is near 0 = stable, above ~0.1 = mild
/// drift, above ~0.25 = significant drift. These are guidance bands, not
/// properties of the PSI computation itself, so the cutoffs stay
/// configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
    Stable,
    Mild,
    Significant,
}

/// Configurable PSI cutoffs for drift banding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftBands {
    pub mild: f64,
    pub significant: f64,
}

impl Default for DriftBands {
    fn default() -> Self {
        Self {
            mild: 0.1,
            significant: 0.25,
        }
    }
}

impl DriftStatus {
    /// Classify a PSI magnitude against the configured bands.
    pub fn from_psi(psi: f64, bands: &DriftBands) -> Self {
        let magnitude = psi.abs();
        if magnitude >= bands.significant {
            DriftStatus::Significant
        } else if magnitude >= bands.mild {
            DriftStatus::Mild
        } else {
            DriftStatus::Stable
        }
    }
}
