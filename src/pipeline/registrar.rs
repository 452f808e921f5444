//! Model Registrar

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use super::error::{PipelineError, PipelineResult};
use crate::models::{
    ExternalEventsDetail, LabelSchema, ModelRegistration, ModelVersion, TrainingDataSchema, TrainingJobHandle,
    EVENT_LABEL, EVENT_TIMESTAMP, UNIFIED_HEADER,
};
use crate::services::{ModelRegistry, ObjectUri};

const MODEL_TYPE: &str = "ONLINE_FRAUD_INSIGHTS";
const TRAINING_DATA_SOURCE: &str = "EXTERNAL_EVENTS";

#[derive(Debug, Clone)]
pub struct RegistrarConfig {
    /// Decision model receiving new versions
    pub model_id: String,
    /// Role the registry assumes to read the unified dataset
    pub events_data_role_arn: String,
}

pub struct Registrar {
    registry: Arc<dyn ModelRegistry>,
    config: RegistrarConfig,
}

impl Registrar {
    pub fn new(registry: Arc<dyn ModelRegistry>, config: RegistrarConfig) -> Self {
        Self { registry, config }
    }

    /// Register a new model version trained on `dataset`.
    ///
    /// Exactly one registry call is made. A rejection is surfaced verbatim;
    /// retrying could create a duplicate version, so that is left to the caller.
    pub async fn register(
        &self,
        dataset: &ObjectUri,
        variables: &[String],
        label_schema: &LabelSchema,
        provenance: Option<&TrainingJobHandle>,
    ) -> PipelineResult<ModelVersion> {
        validate_variables(variables)?;
        validate_label_schema(label_schema)?;

        let registration = ModelRegistration {
            model_type: MODEL_TYPE.to_string(),
            training_data_source: TRAINING_DATA_SOURCE.to_string(),
            external_events_detail: ExternalEventsDetail {
                data_location: dataset.to_string(),
                data_access_role_arn: self.config.events_data_role_arn.clone(),
            },
            training_data_schema: TrainingDataSchema {
                model_variables: variables.to_vec(),
                label_schema: label_schema.clone(),
            },
            description: provenance.map(|job| match &job.artifact_location {
                Some(artifact) => format!("Trained by {} ({})", job.job_name, artifact),
                None => format!("Trained by {}", job.job_name),
            }),
        };

        tracing::info!(model_id = %self.config.model_id, dataset = %dataset, "Registering model version");

        let version_number = self
            .registry
            .register_version(&self.config.model_id, &registration)
            .await
            .map_err(|e| PipelineError::external("model-registry", e))?;

        tracing::info!(model_id = %self.config.model_id, version = %version_number, "Model version registered");

        Ok(ModelVersion {
            model_id: self.config.model_id.clone(),
            version_number,
            data_location: dataset.to_string(),
            label_schema: label_schema.clone(),
            registered_at: Utc::now(),
        })
    }
}

fn validate_variables(variables: &[String]) -> PipelineResult<()> {
    if variables.is_empty() {
        return Err(PipelineError::InvalidRequest("no model variables declared".to_string()));
    }

    let mut seen = HashSet::new();
    for variable in variables {
        let name = variable.as_str();
        if name == EVENT_LABEL || name == EVENT_TIMESTAMP {
            return Err(PipelineError::InvalidRequest(format!("{} cannot be a model variable", name)));
        }
        if !UNIFIED_HEADER.contains(&name) {
            return Err(PipelineError::InvalidRequest(format!(
                "{} is not a unified dataset column",
                name
            )));
        }
        if !seen.insert(name) {
            return Err(PipelineError::InvalidRequest(format!("duplicate model variable {}", name)));
        }
    }
    Ok(())
}

fn validate_label_schema(schema: &LabelSchema) -> PipelineResult<()> {
    if schema.label_mapper.is_empty() {
        return Err(PipelineError::InvalidRequest("label schema maps no labels".to_string()));
    }
    for (label, values) in &schema.label_mapper {
        if values.is_empty() || values.iter().any(|v| v != "0" && v != "1") {
            return Err(PipelineError::InvalidRequest(format!(
                "label {} must map to the unified encoding 0/1",
                label
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MODEL_VARIABLES;
    use crate::services::testing::RecordingRegistry;
    use crate::services::ServiceError;

    fn registrar(registry: Arc<RecordingRegistry>) -> Registrar {
        Registrar::new(
            registry,
            RegistrarConfig {
                model_id: "transaction_fraud_detector".to_string(),
                events_data_role_arn: "arn:role/events".to_string(),
            },
        )
    }

    fn variables() -> Vec<String> {
        MODEL_VARIABLES.iter().map(|v| v.to_string()).collect()
    }

    fn dataset() -> ObjectUri {
        ObjectUri::new("data", "training-data/combined/m_1.csv")
    }

    #[tokio::test]
    async fn test_register_builds_registration() {
        let registry = Arc::new(RecordingRegistry::new());
        let mut job = TrainingJobHandle::submitted("m-1", "job-1");
        job.artifact_location = Some("s3://data/model-artifacts/m-1/model.tar.gz".to_string());

        let version = registrar(registry.clone())
            .register(&dataset(), &variables(), &LabelSchema::fraud_legit(), Some(&job))
            .await
            .unwrap();

        assert_eq!(version.version_number, "1.0");
        assert_eq!(version.model_id, "transaction_fraud_detector");
        assert_eq!(version.data_location, "s3://data/training-data/combined/m_1.csv");

        let calls = registry.calls();
        assert_eq!(calls.len(), 1);
        let (model_id, registration) = &calls[0];
        assert_eq!(model_id, "transaction_fraud_detector");
        assert_eq!(registration.model_type, "ONLINE_FRAUD_INSIGHTS");
        assert_eq!(registration.training_data_source, "EXTERNAL_EVENTS");
        assert_eq!(registration.external_events_detail.data_access_role_arn, "arn:role/events");
        assert_eq!(
            registration.training_data_schema.model_variables,
            vec!["purchase_amount", "ip_address", "device_id", "payment_method"]
        );
        assert!(registration.description.as_deref().unwrap().contains("model.tar.gz"));
    }

    #[tokio::test]
    async fn test_each_registration_is_a_new_version() {
        let registry = Arc::new(RecordingRegistry::new());
        let registrar = registrar(registry.clone());
        let schema = LabelSchema::fraud_legit();

        let first = registrar.register(&dataset(), &variables(), &schema, None).await.unwrap();
        let second = registrar.register(&dataset(), &variables(), &schema, None).await.unwrap();

        assert_ne!(first.version_number, second.version_number);
        assert_eq!(registry.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_surfaces_verbatim_without_retry() {
        let registry = Arc::new(RecordingRegistry::rejecting(400, "ValidationException: unknown variable"));
        let err = registrar(registry.clone())
            .register(&dataset(), &variables(), &LabelSchema::fraud_legit(), None)
            .await
            .unwrap_err();

        assert_eq!(registry.calls().len(), 1);
        match err {
            PipelineError::ExternalService { service, source: ServiceError::Rejected { status, body } } => {
                assert_eq!(service, "model-registry");
                assert_eq!(status, 400);
                assert_eq!(body, "ValidationException: unknown variable");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_label_columns_are_not_variables() {
        let registry = Arc::new(RecordingRegistry::new());
        let registrar = registrar(registry.clone());

        for bad in [vec!["EVENT_LABEL"], vec!["purchase_amount", "purchase_amount"], vec!["card_bin"], vec![]] {
            let bad: Vec<String> = bad.into_iter().map(String::from).collect();
            let err = registrar
                .register(&dataset(), &bad, &LabelSchema::fraud_legit(), None)
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::InvalidRequest(_)));
        }
        assert!(registry.calls().is_empty());
    }

    #[tokio::test]
    async fn test_label_schema_must_use_unified_encoding() {
        let registry = Arc::new(RecordingRegistry::new());
        let mut schema = LabelSchema::fraud_legit();
        schema.label_mapper.insert("FRAUD".to_string(), vec!["yes".to_string()]);

        let err = registrar(registry.clone())
            .register(&dataset(), &variables(), &schema, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRequest(_)));
        assert!(registry.calls().is_empty());
    }
}
