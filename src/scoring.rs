//! Real-time fraud scoring and prediction explanations
//!
//! [`Scorer`] maps an incoming transaction onto the detector's event
//! variables, asks the scoring runtime for a prediction and flattens the
//! per-model scores and matched rules into one result. [`Explainer`] forwards
//! a prediction to the attribution endpoint, when one is configured.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{
    format_amount, EventEntity, EventPrediction, EventPredictionRequest, ExplainRequest, ExplanationQuery,
    ExplanationResult, PredictionResult, TransactionEvent, DEVICE_ID, IP_ADDRESS, PAYMENT_METHOD, PURCHASE_AMOUNT,
};
use crate::pipeline::{PipelineError, PipelineResult};
use crate::services::{EventScorer, FeatureAttributor};

/// Event variable carrying the event time
pub const EVENT_TIMESTAMP_VARIABLE: &str = "event_timestamp";

/// Returned when no attribution endpoint is configured
pub const EXPLANATION_UNAVAILABLE: &str =
    "Explanation endpoint is not configured. Cannot provide detailed explanation.";

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub detector_id: String,
    pub event_type_name: String,
}

pub struct Scorer {
    runtime: Arc<dyn EventScorer>,
    config: ScorerConfig,
}

impl Scorer {
    pub fn new(runtime: Arc<dyn EventScorer>, config: ScorerConfig) -> Self {
        Self { runtime, config }
    }

    pub async fn predict(&self, event: &TransactionEvent) -> PipelineResult<PredictionResult> {
        tracing::info!(event_id = %event.event_id, "Scoring transaction");

        if event.event_type != self.config.event_type_name {
            tracing::warn!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                configured = %self.config.event_type_name,
                "Event type differs from the detector's, scoring as configured type"
            );
        }

        let request = EventPredictionRequest {
            detector_id: self.config.detector_id.clone(),
            event_id: event.event_id.clone(),
            event_type_name: self.config.event_type_name.clone(),
            event_variables: event_variables(event, Utc::now()),
            entities: vec![EventEntity {
                entity_type: event.entity_type.clone(),
                entity_id: event.entity_id.clone(),
            }],
        };

        let prediction = self
            .runtime
            .predict(&request)
            .await
            .map_err(|e| PipelineError::external("scoring-runtime", e))?;

        let result = flatten_prediction(&event.event_id, &self.config.detector_id, prediction);
        tracing::info!(
            event_id = %result.event_id,
            rules = ?result.rule_results,
            outcomes = ?result.outcomes,
            scores = ?result.model_scores,
            "Transaction scored"
        );
        Ok(result)
    }
}

/// Detector variables for `event`. A missing event time becomes `now`.
pub fn event_variables(event: &TransactionEvent, now: DateTime<Utc>) -> BTreeMap<String, String> {
    let timestamp = match event.event_timestamp {
        Some(ts) => ts,
        None => {
            tracing::warn!(event_id = %event.event_id, "Event has no timestamp, using current time");
            now
        }
    };

    [
        (EVENT_TIMESTAMP_VARIABLE, timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        (PURCHASE_AMOUNT, format_amount(event.purchase_amount)),
        (IP_ADDRESS, event.ip_address.clone()),
        (DEVICE_ID, event.device_id.clone()),
        (PAYMENT_METHOD, event.payment_method.clone()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

/// Key every score by its model and version, list matched rules in order and
/// keep each outcome once.
pub fn flatten_prediction(event_id: &str, detector_id: &str, prediction: EventPrediction) -> PredictionResult {
    let mut model_scores = BTreeMap::new();
    for model in prediction.model_scores {
        let prefix = model.model_version.as_ref().and_then(|v| v.score_prefix());
        for (name, score) in model.scores {
            let key = match &prefix {
                Some(prefix) => format!("{}_{}", prefix, name),
                None => name,
            };
            model_scores.insert(key, score);
        }
    }

    let rule_results = prediction.rule_results.iter().map(|r| r.rule_id.clone()).collect();

    let mut seen = HashSet::new();
    let outcomes = prediction
        .rule_results
        .into_iter()
        .flat_map(|r| r.outcomes)
        .filter(|outcome| seen.insert(outcome.clone()))
        .collect();

    PredictionResult {
        event_id: event_id.to_string(),
        detector_id: detector_id.to_string(),
        detector_version_id: prediction.detector_version_id,
        model_scores,
        rule_results,
        outcomes,
    }
}

pub struct Explainer {
    runtime: Arc<dyn FeatureAttributor>,
    endpoint: Option<String>,
}

impl Explainer {
    /// A blank `endpoint` counts as not configured.
    pub fn new(runtime: Arc<dyn FeatureAttributor>, endpoint: Option<String>) -> Self {
        let endpoint = endpoint.filter(|e| !e.trim().is_empty());
        Self { runtime, endpoint }
    }

    pub async fn explain(&self, request: &ExplainRequest) -> PipelineResult<ExplanationResult> {
        tracing::info!(event_id = %request.event_id, "Explaining prediction");

        let Some(endpoint) = self.endpoint.as_deref() else {
            tracing::warn!(event_id = %request.event_id, "Attribution endpoint not configured, no explanation");
            return Ok(ExplanationResult {
                event_id: request.event_id.clone(),
                explanation: Some(EXPLANATION_UNAVAILABLE.to_string()),
                feature_contributions: BTreeMap::new(),
            });
        };

        let query = ExplanationQuery {
            event_id: request.event_id.clone(),
            detector_id: request.detector_id.clone(),
            detector_version_id: request.detector_version_id.clone(),
            event_variables: request.event_variables.clone().unwrap_or_default(),
        };

        let payload = self
            .runtime
            .attribute(endpoint, &query)
            .await
            .map_err(|e| PipelineError::external("attribution-endpoint", e))?;

        let feature_contributions = payload
            .feature_contributions
            .unwrap_or_default()
            .into_iter()
            .map(|(feature, contribution)| (feature, contribution as f32))
            .collect();

        tracing::info!(event_id = %request.event_id, "Prediction explained");
        Ok(ExplanationResult {
            event_id: request.event_id.clone(),
            explanation: payload.explanation_summary,
            feature_contributions,
        })
    }
}
