//! Pipeline error taxonomy

use thiserror::Error;

use crate::models::{FailureKind, JobStatus};
use crate::services::ServiceError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable input: missing header, empty prefix, wrong file type.
    #[error("data source error: {0}")]
    DataSource(String),

    /// A collaborator rejected a call or could not be reached. Never retried.
    #[error("{service} call failed: {source}")]
    ExternalService {
        service: &'static str,
        #[source]
        source: ServiceError,
    },

    /// The job service broke its contract.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("training job {job_id} still {last_status} after waiting {waited_secs}s")]
    PollTimeout {
        job_id: String,
        last_status: JobStatus,
        waited_secs: u64,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    pub fn external(service: &'static str, source: ServiceError) -> Self {
        PipelineError::ExternalService { service, source }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::DataSource(_) => FailureKind::DataSource,
            PipelineError::ExternalService { .. } => FailureKind::ExternalService,
            PipelineError::InvariantViolation(_) => FailureKind::InvariantViolation,
            PipelineError::PollTimeout { .. } => FailureKind::TimedOut,
            PipelineError::InvalidRequest(_) => FailureKind::InvalidRequest,
        }
    }
}
