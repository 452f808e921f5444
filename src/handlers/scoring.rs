//! Real-time scoring and explanation handlers

use axum::{extract::State, Json};
use validator::Validate;

use crate::models::{ExplainRequest, ExplanationResult, PredictionResult, TransactionEvent};
use crate::{AppResult, AppState};

/// Score one transaction against the deployed detector
pub async fn predict(
    State(state): State<AppState>,
    Json(event): Json<TransactionEvent>,
) -> AppResult<Json<PredictionResult>> {
    event.validate()?;

    let prediction = state.scorer.predict(&event).await?;
    Ok(Json(prediction))
}

/// Explain an earlier prediction
pub async fn explain(
    State(state): State<AppState>,
    Json(req): Json<ExplainRequest>,
) -> AppResult<Json<ExplanationResult>> {
    req.validate()?;

    let explanation = state.explainer.explain(&req).await?;
    Ok(Json(explanation))
}
