//! Managed training service gateway

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::http::{build_client, join_url, send_json};
use super::{ServiceResult, TrainingJobService};
use crate::models::{JobDescription, TrainingJobSpec};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobResponse {
    job_id: String,
}

/// Talks to the training gateway:
/// `POST {base}/training-jobs` and `GET {base}/training-jobs/{id}`.
pub struct HttpTrainingService {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTrainingService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http_client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl TrainingJobService for HttpTrainingService {
    async fn submit(&self, spec: &TrainingJobSpec) -> ServiceResult<String> {
        let url = join_url(&self.base_url, "training-jobs");
        let response: SubmitJobResponse = send_json(self.http_client.post(&url).json(spec)).await?;
        Ok(response.job_id)
    }

    async fn describe(&self, job_id: &str) -> ServiceResult<JobDescription> {
        let url = join_url(&self.base_url, &format!("training-jobs/{}", job_id));
        send_json(self.http_client.get(&url)).await
    }
}
