//! `POST /v1/predictions`, scored by whichever model is currently deployed.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use delay_core::{metrics_ext, Flight};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PredictionInput {
    pub flights: Vec<Flight>,
}

#[derive(Debug, Serialize)]
pub struct PredictionOutput {
    pub predictions: Vec<u8>,
}

pub async fn post_predictions(
    State(state): State<AppState>,
    payload: Result<Json<PredictionInput>, JsonRejection>,
) -> Result<Json<PredictionOutput>, ApiError> {
    let Json(input) = payload?;
    if input.flights.is_empty() { return Err(ApiError::invalid_request("flights must contain at least one entry")); }
    let estimator = state.registry.deployed_estimator().ok_or_else(ApiError::model_not_ready)?;
    let predictions = estimator.predict(&input.flights);
    metrics_ext::record_predictions(predictions.len());
    debug!(rows = predictions.len(), "predictions served");
    Ok(Json(PredictionOutput { predictions }))
}
