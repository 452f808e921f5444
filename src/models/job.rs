//! Training job model

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[serde(alias = "Pending", alias = "Starting")]
    Pending,
    #[serde(alias = "Running", alias = "InProgress", alias = "IN_PROGRESS")]
    Running,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Failed")]
    Failed,
    #[serde(alias = "Stopped")]
    Stopped,
}

impl JobStatus {
    /// No further transition happens from a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status snapshot returned by the training service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    pub status: JobStatus,
    #[serde(default)]
    pub artifact_location: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// One submitted training job, owned by a single run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJobHandle {
    pub job_name: String,
    pub job_id: String,
    pub status: JobStatus,
    pub artifact_location: Option<String>,
    pub failure_reason: Option<String>,
}

impl TrainingJobHandle {
    pub fn submitted(job_name: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            job_id: job_id.into(),
            status: JobStatus::Pending,
            artifact_location: None,
            failure_reason: None,
        }
    }

    /// Fold one status snapshot into the handle.
    ///
    /// An artifact location, once reported, is kept even if a later
    /// snapshot omits it.
    pub fn observe(&mut self, description: JobDescription) {
        self.status = description.status;
        if let Some(location) = description.artifact_location.filter(|l| !l.is_empty()) {
            self.artifact_location = Some(location);
        }
        if description.failure_reason.is_some() {
            self.failure_reason = description.failure_reason;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Compute shape for a training job, with defaults already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceShape {
    pub instance_type: String,
    pub instance_count: u32,
    #[serde(rename = "volumeSizeInGB")]
    pub volume_size_gb: u32,
    pub max_runtime_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputChannel {
    pub channel_name: String,
    pub data_uri: String,
    pub data_type: String,
    pub content_type: String,
}

/// Job description sent to the training service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJobSpec {
    pub job_name: String,
    pub training_image: String,
    pub input_mode: String,
    pub role_arn: String,
    pub input_channels: Vec<InputChannel>,
    pub output_path: String,
    pub resources: ResourceShape,
    pub hyperparameters: BTreeMap<String, String>,
}
