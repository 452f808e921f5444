//! Decision model versions and their registration payload

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::synthetic::FraudLabel;
use super::unified::{DEVICE_ID, IP_ADDRESS, PAYMENT_METHOD, PURCHASE_AMOUNT};

/// Unified columns the decision model consumes as inputs.
pub const MODEL_VARIABLES: [&str; 4] = [PURCHASE_AMOUNT, IP_ADDRESS, DEVICE_ID, PAYMENT_METHOD];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnlabeledEventsTreatment {
    Ignore,
}

/// Maps symbolic labels to the numeric encoding used in the unified data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSchema {
    pub label_mapper: BTreeMap<String, Vec<String>>,
    pub unlabeled_events_treatment: UnlabeledEventsTreatment,
}

impl LabelSchema {
    /// FRAUD -> "1", LEGIT -> "0"; unlabeled events are ignored.
    pub fn fraud_legit() -> Self {
        let label_mapper = [FraudLabel::Fraud, FraudLabel::Legit]
            .into_iter()
            .map(|label| {
                let name = match label {
                    FraudLabel::Fraud => "FRAUD",
                    FraudLabel::Legit => "LEGIT",
                };
                (name.to_string(), vec![label.encoded().to_string()])
            })
            .collect();

        Self {
            label_mapper,
            unlabeled_events_treatment: UnlabeledEventsTreatment::Ignore,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEventsDetail {
    pub data_location: String,
    pub data_access_role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingDataSchema {
    pub model_variables: Vec<String>,
    pub label_schema: LabelSchema,
}

/// Payload of one `registerVersion` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRegistration {
    pub model_type: String,
    pub training_data_source: String,
    pub external_events_detail: ExternalEventsDetail,
    pub training_data_schema: TrainingDataSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An immutable, registered model version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub model_id: String,
    pub version_number: String,
    pub data_location: String,
    pub label_schema: LabelSchema,
    pub registered_at: DateTime<Utc>,
}
