//! Model training handlers

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::error::failure_status;
use crate::models::{RetrainRequest, TrainingReport, TrainingRequest};
use crate::{AppResult, AppState};

/// Reconcile data, train and register a model version
///
/// Blocks until the run reaches a terminal state.
pub async fn train(
    State(state): State<AppState>,
    Json(req): Json<TrainingRequest>,
) -> AppResult<(StatusCode, Json<TrainingReport>)> {
    req.validate()?;

    tracing::info!(model_name = %req.model_name, "Received model training request");
    let report = state.orchestrator.run(&req).await;
    tracing::info!(job_name = %report.job_name, state = ?report.state, succeeded = report.succeeded(), "Training run finished");

    Ok((failure_status(report.failure), Json(report)))
}

/// Train again on an existing unified dataset
pub async fn retrain(
    State(state): State<AppState>,
    Json(req): Json<RetrainRequest>,
) -> AppResult<(StatusCode, Json<TrainingReport>)> {
    req.validate()?;

    tracing::info!(model_name = %req.model_name, dataset = %req.dataset_s3_uri, "Received model retraining request");
    let report = state.orchestrator.retrain(&req).await;
    tracing::info!(job_name = %report.job_name, state = ?report.state, succeeded = report.succeeded(), "Retraining run finished");

    Ok((failure_status(report.failure), Json(report)))
}
