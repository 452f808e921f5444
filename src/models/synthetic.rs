//! Synthetic transaction records

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Longest reason kept verbatim
const MAX_REASON_LEN: usize = 255;
/// Length a too-long reason is cut to before the ellipsis
const TRUNCATED_REASON_LEN: usize = 250;

/// Lower (inclusive) and upper (exclusive) bound for repaired fraud amounts
pub const REPAIRED_AMOUNT_RANGE: std::ops::Range<f64> = 10.0..5000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudLabel {
    Fraud,
    #[default]
    Legit,
}

impl FraudLabel {
    /// Numeric encoding used by the unified schema
    pub fn encoded(self) -> &'static str {
        match self {
            FraudLabel::Fraud => "1",
            FraudLabel::Legit => "0",
        }
    }

    /// Case-insensitive parse; anything that is not FRAUD is LEGIT.
    pub fn from_loose(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("FRAUD") {
            FraudLabel::Fraud
        } else {
            FraudLabel::Legit
        }
    }

    /// Label of a record already in the data bucket: only an exact `FRAUD`
    /// counts, every other value is LEGIT.
    pub fn from_stored(value: &str) -> Self {
        if value.trim() == "FRAUD" {
            FraudLabel::Fraud
        } else {
            FraudLabel::Legit
        }
    }
}

/// Accepts any JSON value for `fraudLabel`; non-strings and null are LEGIT.
fn stored_label<'de, D>(deserializer: D) -> Result<FraudLabel, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(label)) => FraudLabel::from_stored(&label),
        _ => FraudLabel::Legit,
    })
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_ip_address() -> String {
    "0.0.0.0".to_string()
}

fn default_device_id() -> String {
    "unknown_device".to_string()
}

fn default_payment_method() -> String {
    "unknown_method".to_string()
}

/// A synthetic transaction as stored in the data bucket.
///
/// The JSON field names follow the generator's record contract
/// (`transactionTimestamp`, `fraudLabel`). Stored files may come from other
/// producers, so reading is lenient: missing fields take defaults and an
/// unrecognised label reads as LEGIT. A missing timestamp is filled in by
/// the reader with the run's submission instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticRecord {
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_ip_address")]
    pub ip_address: String,
    #[serde(default = "default_device_id")]
    pub device_id: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    #[serde(rename = "transactionTimestamp", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "fraudLabel", default, deserialize_with = "stored_label")]
    pub label: FraudLabel,
    #[serde(default)]
    pub reason: String,
}

impl SyntheticRecord {
    /// Enforce the amount invariant: FRAUD records carry a positive amount.
    pub fn repair_amount<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.label == FraudLabel::Fraud && !(self.amount > 0.0) {
            self.amount = rng.gen_range(REPAIRED_AMOUNT_RANGE);
        }
    }
}

/// A record as emitted by the generative model, before normalization.
///
/// Every field is optional because the model output is not trusted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratedTransaction {
    pub transaction_id: Option<String>,
    pub user_id: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_timestamp: Option<DateTime<Utc>>,
    pub fraud_label: Option<String>,
    pub reason: Option<String>,
}

impl GeneratedTransaction {
    /// Turn model output into a record that satisfies the stored invariants.
    pub fn normalize<R: Rng + ?Sized>(self, now: DateTime<Utc>, rng: &mut R) -> SyntheticRecord {
        let transaction_id = match self.transaction_id {
            Some(id) if !is_placeholder(&id, "transaction_") => id,
            _ => Uuid::new_v4().to_string(),
        };
        let user_id = match self.user_id {
            Some(id) if !is_placeholder(&id, "user_") => id,
            _ => short_id("user_"),
        };
        let device_id = match self.device_id {
            Some(id) if !is_placeholder(&id, "device_") => id,
            _ => short_id("device_"),
        };

        let mut record = SyntheticRecord {
            transaction_id,
            user_id,
            amount: self.amount.unwrap_or(0.0),
            currency: self.currency.unwrap_or_else(default_currency),
            ip_address: self.ip_address.unwrap_or_else(default_ip_address),
            device_id,
            payment_method: self.payment_method.unwrap_or_else(default_payment_method),
            timestamp: Some(self.transaction_timestamp.unwrap_or(now)),
            label: self
                .fraud_label
                .as_deref()
                .map(FraudLabel::from_loose)
                .unwrap_or(FraudLabel::Legit),
            reason: truncate_reason(self.reason.unwrap_or_default()),
        };
        record.repair_amount(rng);
        record
    }
}

fn is_placeholder(id: &str, prefix: &str) -> bool {
    id.trim().is_empty() || id.starts_with(prefix)
}

fn short_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &id[..8])
}

fn truncate_reason(reason: String) -> String {
    if reason.chars().count() <= MAX_REASON_LEN {
        return reason;
    }
    let mut cut: String = reason.chars().take(TRUNCATED_REASON_LEN).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fraud_with_amount(amount: f64) -> SyntheticRecord {
        SyntheticRecord {
            transaction_id: "t-1".to_string(),
            user_id: "u-1".to_string(),
            amount,
            currency: "USD".to_string(),
            ip_address: "10.0.0.1".to_string(),
            device_id: "d-1".to_string(),
            payment_method: "card".to_string(),
            timestamp: Some(Utc::now()),
            label: FraudLabel::Fraud,
            reason: String::new(),
        }
    }

    #[test]
    fn test_repair_fraud_amount_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for amount in [0.0, -0.01, -250.0, f64::NAN] {
            for _ in 0..200 {
                let mut record = fraud_with_amount(amount);
                record.repair_amount(&mut rng);
                assert!(record.amount >= 10.0 && record.amount < 5000.0, "got {}", record.amount);
            }
        }
    }

    #[test]
    fn test_repair_leaves_positive_and_legit_amounts() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut record = fraud_with_amount(42.5);
        record.repair_amount(&mut rng);
        assert_eq!(record.amount, 42.5);

        let mut legit = fraud_with_amount(0.0);
        legit.label = FraudLabel::Legit;
        legit.repair_amount(&mut rng);
        assert_eq!(legit.amount, 0.0);
    }

    #[test]
    fn test_normalize_replaces_placeholder_ids() {
        let mut rng = StdRng::seed_from_u64(3);
        let generated = GeneratedTransaction {
            transaction_id: Some("transaction_1".to_string()),
            user_id: Some(String::new()),
            device_id: Some("dev-real".to_string()),
            fraud_label: Some("fraud".to_string()),
            amount: Some(0.0),
            ..Default::default()
        };
        let now = Utc::now();
        let record = generated.normalize(now, &mut rng);

        assert!(Uuid::parse_str(&record.transaction_id).is_ok());
        assert!(record.user_id.starts_with("user_"));
        assert_eq!(record.user_id.len(), "user_".len() + 8);
        assert_eq!(record.device_id, "dev-real");
        assert_eq!(record.label, FraudLabel::Fraud);
        assert_eq!(record.timestamp, Some(now));
        assert!(record.amount >= 10.0);
    }

    #[test]
    fn test_long_reason_truncated() {
        let reason = "x".repeat(300);
        let out = truncate_reason(reason);
        assert_eq!(out.chars().count(), 253);
        assert!(out.ends_with("..."));
        assert_eq!(truncate_reason("short".to_string()), "short");
    }

    #[test]
    fn test_stored_record_json_contract() {
        let json = r#"{
            "transactionId": "t-9",
            "userId": "u-9",
            "amount": 12.5,
            "currency": "EUR",
            "ipAddress": "1.1.1.1",
            "deviceId": "d-9",
            "paymentMethod": "PayPal",
            "transactionTimestamp": "2024-03-01T10:00:00Z",
            "fraudLabel": "LEGIT",
            "reason": "normal"
        }"#;
        let record: SyntheticRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.label, FraudLabel::Legit);
        assert_eq!(record.timestamp.map(|t| t.to_rfc3339()).as_deref(), Some("2024-03-01T10:00:00+00:00"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["fraudLabel"], "LEGIT");
        assert!(back.get("transactionTimestamp").is_some());
    }

    #[test]
    fn test_stored_label_is_exact_fraud_only() {
        for (label, expected) in [
            (r#""FRAUD""#, FraudLabel::Fraud),
            (r#"" FRAUD ""#, FraudLabel::Fraud),
            (r#""fraud""#, FraudLabel::Legit),
            (r#""SUSPICIOUS""#, FraudLabel::Legit),
            (r#""legit""#, FraudLabel::Legit),
            ("null", FraudLabel::Legit),
            ("1", FraudLabel::Legit),
        ] {
            let json = format!(r#"{{"transactionId":"t","amount":1.0,"fraudLabel":{}}}"#, label);
            let record: SyntheticRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(record.label, expected, "label {}", label);
        }
    }

    #[test]
    fn test_stored_record_missing_fields_take_defaults() {
        let record: SyntheticRecord = serde_json::from_str(r#"{"amount":7.5}"#).unwrap();
        assert_eq!(record.label, FraudLabel::Legit);
        assert_eq!(record.user_id, "");
        assert_eq!(record.currency, "USD");
        assert_eq!(record.ip_address, "0.0.0.0");
        assert_eq!(record.device_id, "unknown_device");
        assert_eq!(record.payment_method, "unknown_method");
        assert!(record.timestamp.is_none());

        let back = serde_json::to_value(&record).unwrap();
        assert!(back.get("transactionTimestamp").is_none());
    }

    #[test]
    fn test_malformed_stored_timestamp_is_rejected() {
        let json = r#"{"amount":1.0,"transactionTimestamp":"yesterday","fraudLabel":"FRAUD"}"#;
        assert!(serde_json::from_str::<SyntheticRecord>(json).is_err());
    }
}
