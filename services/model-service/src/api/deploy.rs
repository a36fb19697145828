//! `PUT /v1/models/deploy?model-id=..`, behind the API key gate.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderMap,
    Json,
};
use delay_core::ModelId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::models::parse_id;
use crate::auth::API_KEY_HEADER;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeployParams {
    #[serde(rename = "model-id")]
    pub model_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub id: ModelId,
    pub deployed: &'static str,
}

pub async fn deploy_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<DeployParams>, QueryRejection>,
) -> Result<Json<DeployResponse>, ApiError> {
    let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if let Err(err) = state.gate.check(presented) {
        warn!(status=%err.status, "deploy refused by api key gate");
        return Err(err);
    }
    let Query(params) = params?;
    let id = parse_id(&params.model_id)?;
    state.registry.deploy(&id)?;
    info!(model_id=%id, "deployment switched");
    Ok(Json(DeployResponse { id, deployed: "OK" }))
}
