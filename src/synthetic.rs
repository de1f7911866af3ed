//! Seeded synthetic transaction generation.
//!
//! Produces labeled transaction history with plausible fraud signatures:
//! fraudulent records skew toward high amounts, high-risk countries, night
//! hours, unfamiliar devices and bursty per-account activity. Generation is
//! fully deterministic for a fixed seed.

use crate::types::transaction::TransactionRecord;
use chrono::{Duration, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const LEGIT_COUNTRIES: [&str; 5] = ["US", "GB", "DE", "FR", "CA"];
const RISKY_COUNTRIES: [&str; 4] = ["RU", "CN", "NG", "VN"];

/// Generate `count` labeled records with roughly `fraud_rate` positives.
pub fn generate(count: usize, fraud_rate: f64, seed: u64) -> Vec<TransactionRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let base = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);

    // Account pool with a small stable device set per account.
    let account_count = (count / 10).max(5);
    let accounts: Vec<(String, Vec<String>)> = (0..account_count)
        .map(|a| {
            let devices = (0..rng.gen_range(1..=3))
                .map(|d| format!("fp_{:04}_{}", a, d))
                .collect();
            (format!("acct_{:05}", a), devices)
        })
        .collect();

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let is_fraud = rng.gen::<f64>() < fraud_rate;
        let (account_id, devices) = &accounts[rng.gen_range(0..accounts.len())];

        let record = if is_fraud {
            fraudulent(&mut rng, i, account_id, devices, base)
        } else {
            legitimate(&mut rng, i, account_id, devices, base)
        };
        records.push(record);
    }
    records
}

/// Generate a shifted window of the same population: amounts inflate and
/// high-risk countries dominate, which a PSI comparison against the
/// training baseline should flag.
pub fn generate_drifted(count: usize, fraud_rate: f64, seed: u64) -> Vec<TransactionRecord> {
    generate(count, fraud_rate, seed)
        .into_iter()
        .map(|mut record| {
            record.amount = record.amount * 3.0 + 250.0;
            record.country = "RU".to_string();
            record
        })
        .collect()
}

fn legitimate(
    rng: &mut ChaCha8Rng,
    index: usize,
    account_id: &str,
    devices: &[String],
    base: chrono::DateTime<Utc>,
) -> TransactionRecord {
    // Daytime activity, familiar device, moderate amount.
    let day = rng.gen_range(0..30);
    let hour = rng.gen_range(8..22);
    let offset = Duration::days(day)
        + Duration::hours(hour)
        + Duration::seconds(rng.gen_range(0..3600));
    let amount = 10.0 + rng.gen::<f64>().powi(2) * 240.0;
    let device = devices
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| "fp_unknown".to_string());
    let country = LEGIT_COUNTRIES[rng.gen_range(0..LEGIT_COUNTRIES.len())];

    TransactionRecord::new(
        format!("tx_{:06}", index),
        base + offset,
        account_id,
        country,
        device,
        amount,
    )
    .with_label(0)
}

fn fraudulent(
    rng: &mut ChaCha8Rng,
    index: usize,
    account_id: &str,
    devices: &[String],
    base: chrono::DateTime<Utc>,
) -> TransactionRecord {
    // Night hours, mostly unfamiliar devices and risky geography, high
    // amounts compressed into a narrow time burst.
    let day = rng.gen_range(0..30);
    let hour = rng.gen_range(0..5);
    let offset = Duration::days(day)
        + Duration::hours(hour)
        + Duration::seconds(rng.gen_range(0..900));
    let amount = 400.0 + rng.gen::<f64>() * 2400.0;

    let device = if rng.gen::<f64>() < 0.8 {
        format!("fp_stolen_{:05}", rng.gen_range(0..10_000))
    } else {
        devices
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| "fp_unknown".to_string())
    };
    let country = if rng.gen::<f64>() < 0.7 {
        RISKY_COUNTRIES[rng.gen_range(0..RISKY_COUNTRIES.len())]
    } else {
        LEGIT_COUNTRIES[rng.gen_range(0..LEGIT_COUNTRIES.len())]
    };

    TransactionRecord::new(
        format!("tx_{:06}", index),
        base + offset,
        account_id,
        country,
        device,
        amount,
    )
    .with_label(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let a = generate(200, 0.1, 42);
        let b = generate(200, 0.1, 42);
        assert_eq!(a.len(), 200);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.transaction_id, y.transaction_id);
            assert_eq!(x.amount, y.amount);
            assert_eq!(x.timestamp, y.timestamp);
            assert_eq!(x.label, y.label);
        }
    }

    #[test]
    fn test_fraud_rate_is_approximate() {
        let records = generate(5000, 0.05, 7);
        let fraud = records.iter().filter(|r| r.is_fraud()).count();
        let rate = fraud as f64 / records.len() as f64;
        assert!((rate - 0.05).abs() < 0.015, "observed fraud rate {}", rate);
    }

    #[test]
    fn test_every_record_is_labeled() {
        assert!(generate(300, 0.1, 1).iter().all(|r| r.label.is_some()));
    }

    #[test]
    fn test_fraud_signature_separation() {
        let records = generate(3000, 0.1, 42);
        let mean = |pred: &dyn Fn(&&TransactionRecord) -> bool| {
            let subset: Vec<_> = records.iter().filter(pred).collect();
            subset.iter().map(|r| r.amount).sum::<f64>() / subset.len() as f64
        };
        let fraud_mean = mean(&|r| r.is_fraud());
        let legit_mean = mean(&|r| !r.is_fraud());
        assert!(fraud_mean > legit_mean * 2.0);
    }

    #[test]
    fn test_drifted_window_shifts_amounts() {
        let baseline = generate(500, 0.05, 9);
        let drifted = generate_drifted(500, 0.05, 9);
        let mean = |rs: &[TransactionRecord]| {
            rs.iter().map(|r| r.amount).sum::<f64>() / rs.len() as f64
        };
        assert!(mean(&drifted) > mean(&baseline) * 2.5);
        assert!(drifted.iter().all(|r| r.country == "RU"));
    }
}
