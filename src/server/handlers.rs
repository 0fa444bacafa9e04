//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::features::RawRecord;

/// Body of `POST /predict`
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub data: Vec<RawRecord>,
}

/// One price per input record, in input order
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<f64>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.predictor() {
        Some(predictor) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "model_loaded": true,
                "scaler": predictor.is_scaled(),
                "model_type": predictor.model_kind(),
                "n_features": predictor.n_features(),
                "uptime_secs": chrono::Utc::now()
                    .signed_duration_since(state.started_at)
                    .num_seconds(),
            })),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "model_loaded": false,
            })),
        )
            .into_response(),
    }
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(request) = payload?;
    let predictor = state.predictor().ok_or(ServerError::NotReady)?;

    if request.data.is_empty() {
        return Ok(Json(PredictResponse {
            predictions: Vec::new(),
        }));
    }

    let n_records = request.data.len();
    let predictions = tokio::task::spawn_blocking(move || predictor.predict_records(&request.data))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))??;

    tracing::debug!(n_records, "Predictions served");
    Ok(Json(PredictResponse { predictions }))
}
