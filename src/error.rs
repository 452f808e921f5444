//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::models::FailureKind;
use crate::pipeline::PipelineError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Resource errors
    NotFound(String),

    // Validation errors
    ValidationError(String),

    // Input data errors
    DataSourceError(String),

    // External service errors
    ExternalServiceError(String),
    Timeout(String),

    // Generic errors
    InternalError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DataSourceError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP status for a run that ended with `failure`.
///
/// A job that ran and failed is a reported outcome, not an error.
pub fn failure_status(failure: Option<FailureKind>) -> StatusCode {
    match failure {
        None | Some(FailureKind::TrainingNonSuccess) => StatusCode::OK,
        Some(FailureKind::DataSource) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(FailureKind::ExternalService) => StatusCode::BAD_GATEWAY,
        Some(FailureKind::TimedOut) => StatusCode::GATEWAY_TIMEOUT,
        Some(FailureKind::InvariantViolation) => StatusCode::INTERNAL_SERVER_ERROR,
        Some(FailureKind::InvalidRequest) => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::NotFound(msg) => msg.as_str(),
            AppError::ValidationError(msg) => msg.as_str(),
            AppError::DataSourceError(msg) => msg.as_str(),
            AppError::ExternalServiceError(msg) => {
                tracing::error!("External service error: {}", msg);
                msg.as_str()
            }
            AppError::Timeout(msg) => {
                tracing::warn!("Timed out: {}", msg);
                msg.as_str()
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error"
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::DataSource(_) => AppError::DataSourceError(err.to_string()),
            PipelineError::ExternalService { .. } => AppError::ExternalServiceError(err.to_string()),
            PipelineError::PollTimeout { .. } => AppError::Timeout(err.to_string()),
            PipelineError::InvalidRequest(_) => AppError::ValidationError(err.to_string()),
            PipelineError::InvariantViolation(_) => AppError::InternalError(err.to_string()),
        }
    }
}
