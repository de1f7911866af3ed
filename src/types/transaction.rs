//! Transaction data structures for fraud risk scoring

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw transaction to be scored for fraud risk.
///
/// Records are immutable once ingested. The fraud `label` is present only
/// for historical/labeled data and absent for pure scoring traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction identifier
    pub transaction_id: String,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Actor identifier (cardholder / account)
    pub account_id: String,

    /// Geographic location (ISO country code)
    pub country: String,

    /// Device fingerprint observed on the transaction
    pub device_fingerprint: String,

    /// Monetary amount
    pub amount: f64,

    /// Additional raw numeric attributes, keyed by column name
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,

    /// Binary fraud label (1 = fraud); present only for labeled history
    #[serde(default)]
    pub label: Option<u8>,
}

impl TransactionRecord {
    /// Create a new unlabeled transaction with the required fields.
    pub fn new(
        transaction_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        account_id: impl Into<String>,
        country: impl Into<String>,
        device_fingerprint: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            timestamp,
            account_id: account_id.into(),
            country: country.into(),
            device_fingerprint: device_fingerprint.into(),
            amount,
            attributes: BTreeMap::new(),
            label: None,
        }
    }

    /// Attach a fraud label (1 = fraud, 0 = legitimate).
    pub fn with_label(mut self, label: u8) -> Self {
        self.label = Some(label);
        self
    }

    /// Attach an additional raw numeric attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Whether the record carries a positive fraud label.
    pub fn is_fraud(&self) -> bool {
        self.label == Some(1)
    }
}
