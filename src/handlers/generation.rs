//! Synthetic data generation handler

use axum::{extract::State, Json};
use validator::Validate;

use crate::models::{GenerationReport, GenerationRequest};
use crate::{AppResult, AppState};

/// Generate synthetic fraud records into the data bucket
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> AppResult<Json<GenerationReport>> {
    req.validate()?;

    let report = state.generator.generate(&req).await?;
    Ok(Json(report))
}
