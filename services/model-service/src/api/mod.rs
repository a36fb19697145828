//! HTTP routes, all under `/v1` except the health and metrics endpoints.

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod deploy;
pub mod models;
pub mod predictions;

pub fn create_router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/health", get(health))
        .route("/models", get(models::list_models).post(models::create_model))
        .route("/models/upload", post(models::upload_model))
        .route("/models/deploy", put(deploy::deploy_model))
        .route("/models/:model_id", get(models::get_model).delete(models::delete_model))
        .route("/predictions", post(predictions::post_predictions));

    Router::new()
        .nest("/v1", v1_routes)
        .merge(delay_core::health_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode { StatusCode::NO_CONTENT }
