//! Orchestrator
//!
//! Runs Reconciler, Job Driver and Registrar strictly in sequence for one
//! training request and folds the outcome into a single [`TrainingReport`].
//!
//! ```text
//! INIT -> RECONCILING -> TRAINING_SUBMITTED -> TRAINING_POLLING
//!      -> TRAINING_FAILED | TRAINING_SUCCEEDED -> REGISTERING -> DONE | REGISTER_FAILED
//! ```
//!
//! Nothing is retried. A failed or timed-out job ends the run, and a
//! resubmission through [`TrainingOrchestrator::retrain`] gets a new job
//! identity while reusing the reconciled dataset.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use super::error::{PipelineError, PipelineResult};
use super::job_driver::JobDriver;
use super::reconciler::{ReconcileReport, Reconciler};
use super::registrar::Registrar;
use crate::models::{
    FailureKind, FieldSubstitution, JobStatus, LabelSchema, ResourceOverrides, RetrainRequest, RunIdentity, RunState,
    TrainingJobHandle, TrainingReport, TrainingRequest, MODEL_VARIABLES,
};
use crate::services::ObjectUri;

pub struct TrainingOrchestrator {
    reconciler: Reconciler,
    driver: JobDriver,
    registrar: Registrar,
    model_variables: Vec<String>,
    label_schema: LabelSchema,
    /// Last submission stamp handed out, in epoch millis.
    last_stamp: AtomicI64,
}

impl TrainingOrchestrator {
    pub fn new(reconciler: Reconciler, driver: JobDriver, registrar: Registrar) -> Self {
        Self {
            reconciler,
            driver,
            registrar,
            model_variables: MODEL_VARIABLES.iter().map(|v| v.to_string()).collect(),
            label_schema: LabelSchema::fraud_legit(),
            last_stamp: AtomicI64::new(0),
        }
    }

    /// Reconcile fresh data, train on it and register the result.
    pub async fn run(&self, request: &TrainingRequest) -> TrainingReport {
        let run = RunIdentity::new(request.model_name.clone(), self.next_submission_time());
        let mut tracker = RunTracker::new(&run);

        tracker.advance(RunState::Reconciling);
        let report = match self.reconcile(request, &run).await {
            Ok(report) => report,
            Err(e) => return tracker.fail(RunState::ReconcileFailed, "Data reconciliation failed", e),
        };
        let dataset = report.dataset;
        tracker.dataset_uri = Some(dataset.to_string());
        tracker.substitutions = report.substitutions;

        self.train_and_register(tracker, &dataset, &request.resources).await
    }

    /// Train again on a dataset produced by an earlier run.
    pub async fn retrain(&self, request: &RetrainRequest) -> TrainingReport {
        let run = RunIdentity::new(request.model_name.clone(), self.next_submission_time());
        let mut tracker = RunTracker::new(&run);

        let dataset = match ObjectUri::parse(&request.dataset_s3_uri) {
            Ok(dataset) => dataset,
            Err(e) => {
                return tracker.fail(
                    RunState::ReconcileFailed,
                    "Dataset location rejected",
                    PipelineError::InvalidRequest(e.to_string()),
                )
            }
        };
        tracker.dataset_uri = Some(dataset.to_string());

        self.train_and_register(tracker, &dataset, &request.resources).await
    }

    async fn reconcile(&self, request: &TrainingRequest, run: &RunIdentity) -> PipelineResult<ReconcileReport> {
        let real = ObjectUri::parse(&request.real_data_s3_path)
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;
        let synthetic = ObjectUri::parse(&request.synthetic_data_s3_path)
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

        self.reconciler.reconcile(&real, &synthetic, run).await
    }

    async fn train_and_register(
        &self,
        mut tracker: RunTracker,
        dataset: &ObjectUri,
        resources: &ResourceOverrides,
    ) -> TrainingReport {
        let handle = match self.driver.submit(dataset, &tracker.job_name, resources).await {
            Ok(handle) => handle,
            Err(e) => return tracker.fail(RunState::TrainingFailed, "Training job submission failed", e),
        };
        tracker.advance(RunState::TrainingSubmitted);
        tracker.job_status = Some(handle.status);

        tracker.advance(RunState::TrainingPolling);
        let timeout = resources.poll_timeout_secs.map(Duration::from_secs);
        let handle = match self.driver.await_completion(handle, timeout).await {
            Ok(handle) => handle,
            Err(e) => {
                if let PipelineError::PollTimeout { last_status, .. } = &e {
                    tracker.job_status = Some(*last_status);
                }
                return tracker.fail(RunState::TrainingFailed, "Training did not complete", e);
            }
        };
        tracker.job_status = Some(handle.status);

        if handle.status != JobStatus::Completed {
            return tracker.training_non_success(&handle);
        }
        tracker.advance(RunState::TrainingSucceeded);

        tracker.advance(RunState::Registering);
        match self
            .registrar
            .register(dataset, &self.model_variables, &self.label_schema, Some(&handle))
            .await
        {
            Ok(version) => tracker.done(version.version_number),
            Err(e) => tracker.fail(RunState::RegisterFailed, "Model registration failed", e),
        }
    }

    /// Strictly increasing submission instants, so runs started within the
    /// same millisecond still get distinct job names.
    fn next_submission_time(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        let stamp = now.max(previous + 1);
        Utc.timestamp_millis_opt(stamp).single().unwrap_or_else(Utc::now)
    }
}

/// State of one run, logged on every transition.
struct RunTracker {
    job_name: String,
    state: RunState,
    dataset_uri: Option<String>,
    job_status: Option<JobStatus>,
    substitutions: Vec<FieldSubstitution>,
}

impl RunTracker {
    fn new(run: &RunIdentity) -> Self {
        let job_name = run.job_name();
        tracing::info!(job_name = %job_name, state = ?RunState::Init, "Training run started");
        Self {
            job_name,
            state: RunState::Init,
            dataset_uri: None,
            job_status: None,
            substitutions: Vec::new(),
        }
    }

    fn advance(&mut self, next: RunState) {
        tracing::info!(job_name = %self.job_name, from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
    }

    fn fail(mut self, terminal: RunState, context: &str, error: PipelineError) -> TrainingReport {
        let kind = error.kind();
        match kind {
            FailureKind::InvariantViolation => {
                tracing::error!(job_name = %self.job_name, error = %error, "{}", context)
            }
            _ => tracing::warn!(job_name = %self.job_name, error = %error, "{}", context),
        }
        self.advance(terminal);
        self.report(format!("{}: {}", context, error), Some(kind), None)
    }

    fn training_non_success(mut self, handle: &TrainingJobHandle) -> TrainingReport {
        let status = match &handle.failure_reason {
            Some(reason) => format!("Training job {} ended {}: {}", handle.job_name, handle.status, reason),
            None => format!("Training job {} ended {}", handle.job_name, handle.status),
        };
        tracing::warn!(job_name = %self.job_name, status = %handle.status, "Training job did not succeed");
        self.advance(RunState::TrainingFailed);
        self.report(status, Some(FailureKind::TrainingNonSuccess), None)
    }

    fn done(mut self, version_number: String) -> TrainingReport {
        self.advance(RunState::Done);
        let status = format!(
            "Model training completed; registered model version {}",
            version_number
        );
        self.report(status, None, Some(version_number))
    }

    fn report(self, status: String, failure: Option<FailureKind>, model_version: Option<String>) -> TrainingReport {
        debug_assert!(self.state.is_terminal());
        TrainingReport {
            state: self.state,
            status,
            failure,
            job_name: self.job_name,
            job_status: self.job_status,
            dataset_uri: self.dataset_uri,
            model_version,
            substitutions: self.substitutions,
        }
    }
}
