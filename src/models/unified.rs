//! Unified training schema
//!
//! Both the real and the synthetic source are projected into this fixed,
//! positional six-column layout. The training consumer parses columns by
//! position, so the order of [`UNIFIED_HEADER`] and of [`UnifiedRow::to_csv_line`]
//! must stay in lockstep.

use super::synthetic::SyntheticRecord;

pub const EVENT_LABEL: &str = "EVENT_LABEL";
pub const EVENT_TIMESTAMP: &str = "EVENT_TIMESTAMP";
pub const PURCHASE_AMOUNT: &str = "purchase_amount";
pub const IP_ADDRESS: &str = "ip_address";
pub const DEVICE_ID: &str = "device_id";
pub const PAYMENT_METHOD: &str = "payment_method";

pub const UNIFIED_HEADER: [&str; 6] = [
    EVENT_LABEL,
    EVENT_TIMESTAMP,
    PURCHASE_AMOUNT,
    IP_ADDRESS,
    DEVICE_ID,
    PAYMENT_METHOD,
];

/// Content type of the unified blob
pub const UNIFIED_CONTENT_TYPE: &str = "text/csv";

/// One row of the unified dataset.
///
/// Cells are written verbatim: no quoting, so a value containing a comma
/// shifts every following column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedRow {
    pub label: String,
    pub timestamp: String,
    pub purchase_amount: String,
    pub ip_address: String,
    pub device_id: String,
    pub payment_method: String,
}

impl UnifiedRow {
    pub fn to_csv_line(&self) -> String {
        [
            self.label.as_str(),
            self.timestamp.as_str(),
            self.purchase_amount.as_str(),
            self.ip_address.as_str(),
            self.device_id.as_str(),
            self.payment_method.as_str(),
        ]
        .join(",")
    }

    /// Project a stored synthetic record. A record without a timestamp gets
    /// `fallback_timestamp`.
    pub fn from_synthetic(record: &SyntheticRecord, fallback_timestamp: &str) -> Self {
        Self {
            label: record.label.encoded().to_string(),
            timestamp: record
                .timestamp
                .as_ref()
                .map(format_instant)
                .unwrap_or_else(|| fallback_timestamp.to_string()),
            purchase_amount: format_amount(record.amount),
            ip_address: record.ip_address.clone(),
            device_id: record.device_id.clone(),
            payment_method: record.payment_method.clone(),
        }
    }
}

/// A real-data column that had to be defaulted, and for how many rows.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSubstitution {
    pub column: String,
    pub default: String,
    pub rows: usize,
}

/// Header line followed by rows, newline separated, no trailing newline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedDataset {
    pub rows: Vec<UnifiedRow>,
}

impl UnifiedDataset {
    pub fn header_line() -> String {
        UNIFIED_HEADER.join(",")
    }

    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(Self::header_line());
        lines.extend(self.rows.iter().map(UnifiedRow::to_csv_line));
        lines.join("\n")
    }
}

/// ISO-8601 UTC instant with a `Z` suffix and only as much sub-second
/// precision as the value carries.
pub fn format_instant(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

/// Decimal rendering that always keeps a fractional part (`100.0`, `12.34`).
pub fn format_amount(amount: f64) -> String {
    format!("{:?}", amount)
}
