//! Training requests, run identity and run reports

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::job::{JobStatus, ResourceShape};
use super::unified::FieldSubstitution;

/// Leaves room for `-<epoch millis>` within a 63 character job name.
const MAX_MODEL_NAME_LEN: usize = 48;

static MODEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9](-*[a-zA-Z0-9])*$").expect("valid model name regex"));

/// Optional compute overrides carried by training requests.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOverrides {
    pub instance_type: Option<String>,

    #[validate(range(min = 1, message = "instanceCount must be >= 1"))]
    pub instance_count: Option<u32>,

    #[serde(rename = "volumeSizeInGB")]
    #[validate(range(min = 5, message = "volumeSizeInGB must be >= 5"))]
    pub volume_size_gb: Option<u32>,

    #[serde(rename = "maxRuntimeInSeconds")]
    #[validate(range(min = 60, message = "maxRuntimeInSeconds must be >= 60"))]
    pub max_runtime_secs: Option<u64>,

    /// How long this run waits for the job before giving up.
    #[serde(rename = "pollTimeoutSeconds")]
    #[validate(range(min = 1, message = "pollTimeoutSeconds must be >= 1"))]
    pub poll_timeout_secs: Option<u64>,
}

impl ResourceOverrides {
    /// Apply defaults: one instance, the configured instance class, 20 GB.
    pub fn resolve(&self, default_instance_type: &str, default_max_runtime_secs: u64) -> ResourceShape {
        ResourceShape {
            instance_type: self
                .instance_type
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(default_instance_type)
                .to_string(),
            instance_count: self.instance_count.unwrap_or(1),
            volume_size_gb: self.volume_size_gb.unwrap_or(20),
            max_runtime_secs: self.max_runtime_secs.unwrap_or(default_max_runtime_secs),
        }
    }
}

/// Request to reconcile fresh data, train and register a model version.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    #[validate(custom(function = "validate_s3_uri"))]
    pub real_data_s3_path: String,

    #[validate(custom(function = "validate_s3_uri"))]
    pub synthetic_data_s3_path: String,

    #[validate(custom(function = "validate_model_name"))]
    pub model_name: String,

    #[serde(flatten)]
    #[validate(nested)]
    pub resources: ResourceOverrides,
}

/// Request to train again on an already reconciled dataset.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RetrainRequest {
    #[validate(custom(function = "validate_s3_uri"))]
    pub dataset_s3_uri: String,

    #[validate(custom(function = "validate_model_name"))]
    pub model_name: String,

    #[serde(flatten)]
    #[validate(nested)]
    pub resources: ResourceOverrides,
}

fn validate_s3_uri(value: &str) -> Result<(), ValidationError> {
    let rest = value.strip_prefix("s3://").unwrap_or_default();
    if rest.is_empty() || rest.starts_with('/') {
        let mut err = ValidationError::new("s3_uri");
        err.message = Some(Cow::from("must be an s3://bucket/prefix URI"));
        return Err(err);
    }
    Ok(())
}

fn validate_model_name(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_MODEL_NAME_LEN || !MODEL_NAME_RE.is_match(value) {
        let mut err = ValidationError::new("model_name");
        err.message = Some(Cow::from(
            "modelName must be 1-48 alphanumeric characters or hyphens, starting and ending alphanumeric",
        ));
        return Err(err);
    }
    Ok(())
}

/// Identity of one training run: base name plus submission instant.
///
/// Everything a run creates (dataset key, job name) is derived from this,
/// so concurrent runs never collide on a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    pub model_name: String,
    pub submitted_at: DateTime<Utc>,
}

impl RunIdentity {
    pub fn new(model_name: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            model_name: model_name.into(),
            submitted_at,
        }
    }

    pub fn stamp(&self) -> i64 {
        self.submitted_at.timestamp_millis()
    }

    pub fn job_name(&self) -> String {
        format!("{}-{}", self.model_name, self.stamp())
    }
}

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Init,
    Reconciling,
    ReconcileFailed,
    TrainingSubmitted,
    TrainingPolling,
    TrainingFailed,
    TrainingSucceeded,
    Registering,
    Done,
    RegisterFailed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::ReconcileFailed | RunState::TrainingFailed | RunState::Done | RunState::RegisterFailed
        )
    }
}

/// Why a run did not reach `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// No usable input data.
    DataSource,
    /// A collaborator rejected a call or could not be reached.
    ExternalService,
    /// The job ran and ended FAILED or STOPPED.
    TrainingNonSuccess,
    /// The job did not finish within the wait bound.
    TimedOut,
    /// The job service broke its contract (e.g. COMPLETED without artifact).
    InvariantViolation,
    /// The request could not be turned into a job or registration.
    InvalidRequest,
}

/// The single result of one orchestrated run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub state: RunState,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub job_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Real-data columns that were defaulted while reconciling
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<FieldSubstitution>,
}

impl TrainingReport {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done
    }
}
