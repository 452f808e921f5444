//! External collaborator boundaries
//!
//! The pipeline only talks to the outside world through the traits in this
//! module: an object store, a managed training service, a decision model
//! registry, a generative model runtime, the real-time scoring runtime and a
//! feature attribution endpoint. Concrete adapters live in the submodules.

pub mod storage;
pub mod http;
pub mod training;
pub mod registry;
pub mod generator;
pub mod scoring;
pub mod attribution;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    AttributionPayload, EventPrediction, EventPredictionRequest, ExplanationQuery, JobDescription,
    ModelRegistration, TrainingJobSpec,
};

pub use storage::{InMemoryObjectStore, LocalObjectStore, ObjectUri};
pub use training::HttpTrainingService;
pub use registry::HttpModelRegistry;
pub use generator::{GenerationPrompt, HttpTextGenerator};
pub use scoring::HttpEventScorer;
pub use attribution::HttpFeatureAttributor;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised at a collaborator boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid object URI: {0}")]
    InvalidUri(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status; body kept verbatim.
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

/// Blob storage holding raw, synthetic and unified datasets.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Objects whose key starts with `prefix.key`, in key order.
    async fn list(&self, prefix: &ObjectUri) -> ServiceResult<Vec<ObjectUri>>;

    async fn get(&self, object: &ObjectUri) -> ServiceResult<Vec<u8>>;

    /// Returns only once the object is durable.
    async fn put(&self, object: &ObjectUri, body: Vec<u8>, content_type: &str) -> ServiceResult<()>;
}

/// Managed training service.
#[async_trait]
pub trait TrainingJobService: Send + Sync {
    /// Create a job and return its identifier.
    async fn submit(&self, spec: &TrainingJobSpec) -> ServiceResult<String>;

    /// Current status of a job. Eventually consistent.
    async fn describe(&self, job_id: &str) -> ServiceResult<JobDescription>;
}

/// Decision model registry.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Register a new version and return its version number.
    async fn register_version(&self, model_id: &str, registration: &ModelRegistration) -> ServiceResult<String>;
}

/// Generative model runtime.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one completion and return the generated text.
    async fn complete(&self, prompt: &GenerationPrompt) -> ServiceResult<String>;
}

/// Real-time fraud scoring runtime.
#[async_trait]
pub trait EventScorer: Send + Sync {
    async fn predict(&self, request: &EventPredictionRequest) -> ServiceResult<EventPrediction>;
}

/// Hosted endpoint that attributes a prediction to its input features.
#[async_trait]
pub trait FeatureAttributor: Send + Sync {
    async fn attribute(&self, endpoint: &str, query: &ExplanationQuery) -> ServiceResult<AttributionPayload>;
}
