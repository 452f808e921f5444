//! Scripted in-process collaborators for pipeline tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    EventScorer, FeatureAttributor, GenerationPrompt, ModelRegistry, ServiceError, ServiceResult, TextGenerator,
    TrainingJobService,
};
use crate::models::{
    AttributionPayload, EventPrediction, EventPredictionRequest, ExplanationQuery, JobDescription, JobStatus,
    ModelRegistration, TrainingJobSpec,
};

pub fn status(status: JobStatus) -> JobDescription {
    JobDescription {
        status,
        artifact_location: None,
        failure_reason: None,
    }
}

pub fn completed(artifact: &str) -> JobDescription {
    JobDescription {
        status: JobStatus::Completed,
        artifact_location: Some(artifact.to_string()),
        failure_reason: None,
    }
}

/// Replays a fixed sequence of job statuses; the last one repeats forever.
pub struct ScriptedTrainingService {
    script: Mutex<VecDeque<JobDescription>>,
    last: Mutex<Option<JobDescription>>,
    reject_submit: Option<(u16, String)>,
    submitted: Mutex<Vec<TrainingJobSpec>>,
    describe_calls: AtomicUsize,
}

impl ScriptedTrainingService {
    pub fn new(script: Vec<JobDescription>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            reject_submit: None,
            submitted: Mutex::new(Vec::new()),
            describe_calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting_submit(status: u16, body: &str) -> Self {
        let mut service = Self::new(Vec::new());
        service.reject_submit = Some((status, body.to_string()));
        service
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<TrainingJobSpec> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl TrainingJobService for ScriptedTrainingService {
    async fn submit(&self, spec: &TrainingJobSpec) -> ServiceResult<String> {
        if let Some((status, body)) = &self.reject_submit {
            return Err(ServiceError::Rejected {
                status: *status,
                body: body.clone(),
            });
        }
        self.submitted.lock().push(spec.clone());
        Ok(format!("arn:training-job/{}", spec.job_name))
    }

    async fn describe(&self, _job_id: &str) -> ServiceResult<JobDescription> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(description) => {
                *last = Some(description.clone());
                Ok(description)
            }
            None => last
                .clone()
                .ok_or_else(|| ServiceError::Transport("no scripted status".to_string())),
        }
    }
}

/// Records registrations and hands out increasing version numbers.
pub struct RecordingRegistry {
    calls: Mutex<Vec<(String, ModelRegistration)>>,
    reject: Option<(u16, String)>,
    next_version: AtomicU32,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reject: None,
            next_version: AtomicU32::new(1),
        }
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            reject: Some((status, body.to_string())),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<(String, ModelRegistration)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ModelRegistry for RecordingRegistry {
    async fn register_version(&self, model_id: &str, registration: &ModelRegistration) -> ServiceResult<String> {
        self.calls.lock().push((model_id.to_string(), registration.clone()));
        if let Some((status, body)) = &self.reject {
            return Err(ServiceError::Rejected {
                status: *status,
                body: body.clone(),
            });
        }
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}.0", version))
    }
}

/// Replays scripted completions; fails once the script runs out.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<ServiceResult<String>>>,
    prompts: Mutex<Vec<GenerationPrompt>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<ServiceResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<GenerationPrompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &GenerationPrompt) -> ServiceResult<String> {
        self.prompts.lock().push(prompt.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Transport("model unavailable".to_string())))
    }
}

/// Answers the first prediction with a scripted result, then fails.
pub struct ScriptedScorer {
    response: Mutex<Option<ServiceResult<EventPrediction>>>,
    requests: Mutex<Vec<EventPredictionRequest>>,
}

impl ScriptedScorer {
    pub fn new(response: ServiceResult<EventPrediction>) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<EventPredictionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl EventScorer for ScriptedScorer {
    async fn predict(&self, request: &EventPredictionRequest) -> ServiceResult<EventPrediction> {
        self.requests.lock().push(request.clone());
        self.response
            .lock()
            .take()
            .unwrap_or_else(|| Err(ServiceError::Transport("scorer unavailable".to_string())))
    }
}

/// Records attribution calls and answers the first with a scripted result.
pub struct RecordingAttributor {
    response: Mutex<Option<ServiceResult<AttributionPayload>>>,
    calls: Mutex<Vec<(String, ExplanationQuery)>>,
}

impl RecordingAttributor {
    pub fn new(response: ServiceResult<AttributionPayload>) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, ExplanationQuery)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl FeatureAttributor for RecordingAttributor {
    async fn attribute(&self, endpoint: &str, query: &ExplanationQuery) -> ServiceResult<AttributionPayload> {
        self.calls.lock().push((endpoint.to_string(), query.clone()));
        self.response
            .lock()
            .take()
            .unwrap_or_else(|| Err(ServiceError::Transport("attribution endpoint unavailable".to_string())))
    }
}
