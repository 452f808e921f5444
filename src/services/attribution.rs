//! Feature attribution endpoint gateway

use std::time::Duration;

use async_trait::async_trait;

use super::http::{build_client, join_url, send_json};
use super::{FeatureAttributor, ServiceResult};
use crate::models::{AttributionPayload, ExplanationQuery};

/// `POST {base}/endpoints/{endpoint}/invocations`
pub struct HttpFeatureAttributor {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpFeatureAttributor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http_client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl FeatureAttributor for HttpFeatureAttributor {
    async fn attribute(&self, endpoint: &str, query: &ExplanationQuery) -> ServiceResult<AttributionPayload> {
        let url = join_url(&self.base_url, &format!("endpoints/{}/invocations", endpoint));
        send_json(
            self.http_client
                .post(&url)
                .header("Accept", "application/json")
                .json(query),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceError;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn query(variables: BTreeMap<String, String>) -> ExplanationQuery {
        ExplanationQuery {
            event_id: "evt-1".to_string(),
            detector_id: "payments".to_string(),
            detector_version_id: "2".to_string(),
            event_variables: variables,
        }
    }

    #[tokio::test]
    async fn test_attribute_sends_snake_case_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/endpoints/clarify-1/invocations"))
            .and(body_json(serde_json::json!({
                "event_id": "evt-1",
                "detector_id": "payments",
                "detector_version_id": "2"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "explanation_summary": "High amount",
                "feature_contributions": {"purchase_amount": 0.6, "ip_address": -0.1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let attributor = HttpFeatureAttributor::new(server.uri(), Duration::from_secs(5)).unwrap();
        let payload = attributor.attribute("clarify-1", &query(BTreeMap::new())).await.unwrap();

        assert_eq!(payload.explanation_summary.as_deref(), Some("High amount"));
        let contributions = payload.feature_contributions.unwrap();
        assert_eq!(contributions["purchase_amount"], 0.6);
        assert_eq!(contributions["ip_address"], -0.1);
    }

    #[tokio::test]
    async fn test_non_numeric_contribution_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "feature_contributions": {"purchase_amount": "high"}
            })))
            .mount(&server)
            .await;

        let attributor = HttpFeatureAttributor::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = attributor.attribute("clarify-1", &query(BTreeMap::new())).await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
    }
}
