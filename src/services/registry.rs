//! Decision model registry gateway

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::http::{build_client, join_url, send_json};
use super::{ModelRegistry, ServiceResult};
use crate::models::ModelRegistration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterVersionResponse {
    model_version_number: String,
}

/// `POST {base}/models/{model_id}/versions`
pub struct HttpModelRegistry {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpModelRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http_client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ModelRegistry for HttpModelRegistry {
    async fn register_version(&self, model_id: &str, registration: &ModelRegistration) -> ServiceResult<String> {
        let url = join_url(&self.base_url, &format!("models/{}/versions", model_id));
        let response: RegisterVersionResponse =
            send_json(self.http_client.post(&url).json(registration)).await?;
        Ok(response.model_version_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalEventsDetail, LabelSchema, TrainingDataSchema};
    use crate::services::ServiceError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registration() -> ModelRegistration {
        ModelRegistration {
            model_type: "ONLINE_FRAUD_INSIGHTS".to_string(),
            training_data_source: "EXTERNAL_EVENTS".to_string(),
            external_events_detail: ExternalEventsDetail {
                data_location: "s3://bucket/training-data/combined/x.csv".to_string(),
                data_access_role_arn: "arn:role".to_string(),
            },
            training_data_schema: TrainingDataSchema {
                model_variables: vec!["purchase_amount".to_string()],
                label_schema: LabelSchema::fraud_legit(),
            },
            description: None,
        }
    }

    #[tokio::test]
    async fn test_register_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/detector/versions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"modelVersionNumber": "2.0"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let registry = HttpModelRegistry::new(server.uri(), Duration::from_secs(5)).unwrap();
        let version = registry.register_version("detector", &registration()).await.unwrap();
        assert_eq!(version, "2.0");
    }

    #[tokio::test]
    async fn test_malformed_response_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/detector/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"version": 2})))
            .mount(&server)
            .await;

        let registry = HttpModelRegistry::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = registry.register_version("detector", &registration()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
    }
}
