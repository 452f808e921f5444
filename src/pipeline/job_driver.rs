//! Job Driver
//!
//! Submits a training job against a unified dataset and waits for it to reach
//! a terminal status. The wait is a plain future: it is bounded by
//! `tokio::time::timeout`, and dropping it stops polling at the next await.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::error::{PipelineError, PipelineResult};
use crate::models::{
    InputChannel, JobStatus, ResourceOverrides, TrainingJobHandle, TrainingJobSpec, UNIFIED_CONTENT_TYPE,
};
use crate::services::{ObjectUri, TrainingJobService};

#[derive(Debug, Clone)]
pub struct JobDriverConfig {
    pub training_image: String,
    pub role_arn: String,
    pub output_bucket: String,
    pub output_prefix: String,
    pub default_instance_type: String,
    pub poll_interval: Duration,
    /// Wait bound when the request does not carry its own.
    pub default_timeout: Duration,
    /// Runtime bound enforced by the training service itself.
    pub default_max_runtime_secs: u64,
    pub hyperparameters: BTreeMap<String, String>,
}

pub struct JobDriver {
    service: Arc<dyn TrainingJobService>,
    config: JobDriverConfig,
}

impl JobDriver {
    pub fn new(service: Arc<dyn TrainingJobService>, config: JobDriverConfig) -> Self {
        Self { service, config }
    }

    /// Build the job description for `dataset`.
    pub fn job_spec(&self, dataset: &ObjectUri, job_name: &str, overrides: &ResourceOverrides) -> TrainingJobSpec {
        TrainingJobSpec {
            job_name: job_name.to_string(),
            training_image: self.config.training_image.clone(),
            input_mode: "File".to_string(),
            role_arn: self.config.role_arn.clone(),
            input_channels: vec![InputChannel {
                channel_name: "train".to_string(),
                data_uri: dataset.to_string(),
                data_type: "S3Prefix".to_string(),
                content_type: UNIFIED_CONTENT_TYPE.to_string(),
            }],
            output_path: format!(
                "s3://{}/{}{}/",
                self.config.output_bucket, self.config.output_prefix, job_name
            ),
            resources: overrides.resolve(&self.config.default_instance_type, self.config.default_max_runtime_secs),
            hyperparameters: self.config.hyperparameters.clone(),
        }
    }

    /// Submit one job. A rejection is returned as-is; submission is never retried.
    pub async fn submit(
        &self,
        dataset: &ObjectUri,
        job_name: &str,
        overrides: &ResourceOverrides,
    ) -> PipelineResult<TrainingJobHandle> {
        let spec = self.job_spec(dataset, job_name, overrides);

        tracing::info!(
            job_name = %job_name,
            dataset = %dataset,
            instance_type = %spec.resources.instance_type,
            instance_count = spec.resources.instance_count,
            "Submitting training job"
        );

        let job_id = self
            .service
            .submit(&spec)
            .await
            .map_err(|e| PipelineError::external("training-service", e))?;

        tracing::info!(job_name = %job_name, job_id = %job_id, "Training job submitted");
        Ok(TrainingJobHandle::submitted(job_name, job_id))
    }

    /// Poll until the job is terminal or `timeout` elapses.
    ///
    /// FAILED and STOPPED come back as `Ok` with that status; COMPLETED
    /// without an artifact location is an invariant violation.
    pub async fn await_completion(
        &self,
        mut handle: TrainingJobHandle,
        timeout: Option<Duration>,
    ) -> PipelineResult<TrainingJobHandle> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let started = Instant::now();

        let outcome = tokio::time::timeout(timeout, self.poll_until_terminal(&mut handle)).await;
        match outcome {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    job_id = %handle.job_id,
                    status = %handle.status,
                    waited_secs = started.elapsed().as_secs(),
                    "Gave up waiting for training job"
                );
                return Err(PipelineError::PollTimeout {
                    job_id: handle.job_id,
                    last_status: handle.status,
                    waited_secs: timeout.as_secs(),
                });
            }
        }

        if handle.status == JobStatus::Completed && handle.artifact_location.is_none() {
            tracing::error!(job_id = %handle.job_id, "Training job completed without an artifact location");
            return Err(PipelineError::InvariantViolation(format!(
                "training job {} reported COMPLETED without an artifact location",
                handle.job_id
            )));
        }

        Ok(handle)
    }

    async fn poll_until_terminal(&self, handle: &mut TrainingJobHandle) -> PipelineResult<()> {
        let mut polls = 0u32;
        loop {
            let description = self
                .service
                .describe(&handle.job_id)
                .await
                .map_err(|e| PipelineError::external("training-service", e))?;
            polls += 1;
            handle.observe(description);

            tracing::info!(job_id = %handle.job_id, status = %handle.status, poll = polls, "Training job status");

            if handle.is_terminal() {
                return Ok(());
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
