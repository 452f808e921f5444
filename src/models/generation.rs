//! Synthetic data generation requests and reports

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Kind of fraud to simulate, e.g. `synthetic_identity`.
    #[validate(length(min = 1, max = 64, message = "fraudType must be 1-64 characters"))]
    pub fraud_type: String,

    #[validate(range(min = 1, max = 1000, message = "count must be between 1 and 1000"))]
    pub count: u32,

    pub additional_details: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub status: String,
    pub requested: u32,
    pub generated: usize,
    pub batches_attempted: u32,
    pub batches_failed: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl GenerationReport {
    pub fn stored(&self) -> bool {
        self.location.is_some()
    }
}
