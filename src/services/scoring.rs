//! Real-time scoring runtime gateway

use std::time::Duration;

use async_trait::async_trait;

use super::http::{build_client, join_url, send_json};
use super::{EventScorer, ServiceResult};
use crate::models::{EventPrediction, EventPredictionRequest};

/// `POST {base}/detectors/{detector_id}/predictions`
pub struct HttpEventScorer {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpEventScorer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http_client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl EventScorer for HttpEventScorer {
    async fn predict(&self, request: &EventPredictionRequest) -> ServiceResult<EventPrediction> {
        let url = join_url(&self.base_url, &format!("detectors/{}/predictions", request.detector_id));
        send_json(self.http_client.post(&url).json(request)).await
    }
}
