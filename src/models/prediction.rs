//! Real-time scoring and explanation: API payloads and collaborator wire types

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A transaction to score, carrying the detector's event variables.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    #[validate(custom(function = "validate_not_blank"))]
    pub event_id: String,

    /// Event type the caller believes it is sending; the configured one is used.
    #[validate(custom(function = "validate_not_blank"))]
    pub event_type: String,

    #[validate(custom(function = "validate_not_blank"))]
    pub entity_type: String,

    #[validate(custom(function = "validate_not_blank"))]
    pub entity_id: String,

    #[validate(custom(function = "validate_not_blank"))]
    pub ip_address: String,

    #[validate(custom(function = "validate_positive_amount"))]
    pub purchase_amount: f64,

    #[validate(custom(function = "validate_not_blank"))]
    pub device_id: String,

    #[validate(custom(function = "validate_not_blank"))]
    pub payment_method: String,

    /// Scoring time is used when absent.
    pub event_timestamp: Option<DateTime<Utc>>,
}

/// Outcome of scoring one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub event_id: String,
    pub detector_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector_version_id: Option<String>,
    /// `<modelId>:<version>_<score name>` to score
    pub model_scores: BTreeMap<String, f32>,
    /// Ids of the rules that matched, in evaluation order
    pub rule_results: Vec<String>,
    /// Distinct outcomes of the matched rules, first occurrence first
    pub outcomes: Vec<String>,
}

/// Request to explain an earlier prediction.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub event_id: String,

    #[validate(custom(function = "validate_not_blank"))]
    pub detector_id: String,

    #[validate(custom(function = "validate_not_blank"))]
    pub detector_version_id: String,

    /// Variables the prediction was made with, if the caller kept them.
    pub event_variables: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationResult {
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Feature name to signed contribution
    pub feature_contributions: BTreeMap<String, f32>,
}

// ============================================================================
// SCORING RUNTIME WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntity {
    pub entity_type: String,
    pub entity_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPredictionRequest {
    pub detector_id: String,
    pub event_id: String,
    pub event_type_name: String,
    pub event_variables: BTreeMap<String, String>,
    pub entities: Vec<EventEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPrediction {
    pub detector_version_id: Option<String>,
    pub model_scores: Vec<ModelScores>,
    pub rule_results: Vec<RuleResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelScores {
    pub model_version: Option<ScoredModelVersion>,
    pub scores: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoredModelVersion {
    pub model_id: Option<String>,
    pub model_version_number: Option<String>,
}

impl ScoredModelVersion {
    /// Prefix for this model's score names.
    pub fn score_prefix(&self) -> Option<String> {
        match (&self.model_id, &self.model_version_number) {
            (Some(id), Some(version)) => Some(format!("{}:{}", id, version)),
            (Some(id), None) => Some(id.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleResult {
    pub rule_id: String,
    pub outcomes: Vec<String>,
}

// ============================================================================
// ATTRIBUTION ENDPOINT WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationQuery {
    pub event_id: String,
    pub detector_id: String,
    pub detector_version_id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub event_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AttributionPayload {
    pub explanation_summary: Option<String>,
    pub feature_contributions: Option<BTreeMap<String, f64>>,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("not_blank");
        err.message = Some(Cow::from("must not be blank"));
        return Err(err);
    }
    Ok(())
}

fn validate_positive_amount(value: f64) -> Result<(), ValidationError> {
    if !(value > 0.0) {
        let mut err = ValidationError::new("positive_amount");
        err.message = Some(Cow::from("purchaseAmount must be positive"));
        return Err(err);
    }
    Ok(())
}
