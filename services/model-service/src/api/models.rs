//! Model resource endpoints: create (train), upload, list, read/export, delete.

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use delay_core::{metrics_ext, EstimatorError, ModelId, ModelStatus, ModelView, ResourceError};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateModelBody {
    pub data_source: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadModelBody {
    pub model_location: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetModelParams {
    #[serde(default)]
    pub export: Option<bool>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Wire shape of a model resource. `errors` only appears on failed models.
#[derive(Debug, Serialize)]
pub struct ModelBody {
    pub id: ModelId,
    pub status: ModelStatus,
    pub deployed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResourceError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<&'static str>,
}

impl From<ModelView> for ModelBody {
    fn from(view: ModelView) -> Self {
        Self { id: view.id, status: view.status, deployed: view.deployed, errors: view.errors, export: None }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelBody>,
}

/// Ids are opaque; anything that is not one cannot name a stored model.
pub(crate) fn parse_id(raw: &str) -> Result<ModelId, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::model_not_found())
}

/// Absolute when the request named its `Host`, path-only otherwise.
fn model_location(headers: &HeaderMap, id: ModelId) -> String {
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{host}/v1/models/{id}"),
        None => format!("/v1/models/{id}"),
    }
}

/// Export targets must be a bare file name inside the export directory.
fn valid_export_name(name: &str) -> bool {
    name != "." && name != ".." && std::path::Path::new(name).file_name() == Some(OsStr::new(name))
}

fn created(state: &AppState, headers: &HeaderMap, id: ModelId) -> Result<Response, ApiError> {
    let view = state.registry.view(&id).ok_or_else(ApiError::model_not_found)?;
    let location = model_location(headers, id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(ModelBody::from(view))).into_response())
}

/// Inserts a `Pending` resource, trains, then records the outcome. Training
/// failures keep the resource as `Failed` rather than removing it.
pub async fn create_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateModelBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let source = body.data_source.trim();
    if source.is_empty() { return Err(ApiError::invalid_request("data_source must not be empty")); }

    let resource = delay_core::ModelResource::new();
    let id = resource.id();
    state.registry.insert(resource)?;
    info!(model_id=%id, data_source=%source, "training started");

    match tokio::time::timeout(state.train_timeout, state.estimators.train(source)).await {
        Ok(Ok(estimator)) => {
            state.registry.set_estimator(&id, estimator)?;
            state.registry.transition_status(&id, ModelStatus::Completed)?;
            metrics_ext::record_created("completed");
            info!(model_id=%id, "training completed");
        }
        Ok(Err(err @ EstimatorError::SchemaMismatch(_))) => {
            warn!(model_id=%id, error=%err, "training data rejected");
            state.registry.fail(&id, vec![ApiError::from(err).resource_error()])?;
            metrics_ext::record_created("failed");
        }
        Ok(Err(err)) => {
            warn!(model_id=%id, error=%err, "training failed");
            let api = ApiError::from(err);
            state.registry.fail(&id, vec![api.resource_error()])?;
            metrics_ext::record_created("failed");
            return Err(api);
        }
        Err(_) => {
            warn!(model_id=%id, timeout=?state.train_timeout, "training timed out");
            let api = ApiError::training_timeout();
            state.registry.fail(&id, vec![api.resource_error()])?;
            metrics_ext::record_created("timeout");
            return Err(api);
        }
    }
    created(&state, &headers, id)
}

/// Loads first and only registers the model once it is known to be usable.
pub async fn upload_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UploadModelBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let location = body.model_location.trim();
    if location.is_empty() { return Err(ApiError::invalid_request("model_location must not be empty")); }

    let estimator = state.estimators.load(std::path::Path::new(location)).await.map_err(|err| {
        warn!(model_location=%location, error=%err, "upload rejected");
        ApiError::from(err)
    })?;

    let resource = delay_core::ModelResource::new();
    let id = resource.id();
    state.registry.insert(resource)?;
    state.registry.set_estimator(&id, estimator)?;
    state.registry.transition_status(&id, ModelStatus::Completed)?;
    metrics_ext::record_created("uploaded");
    info!(model_id=%id, model_location=%location, "model uploaded");
    created(&state, &headers, id)
}

pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state.registry.list().into_iter().map(ModelBody::from).collect();
    Json(ModelsResponse { models })
}

/// `?export=true[&file_name=..]` also writes the estimator into the export directory.
pub async fn get_model(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    params: Result<Query<GetModelParams>, QueryRejection>,
) -> Result<Json<ModelBody>, ApiError> {
    let id = parse_id(&raw_id)?;
    let Query(params) = params?;
    let view = state.registry.view(&id).ok_or_else(ApiError::model_not_found)?;
    let mut body = ModelBody::from(view);

    if params.export.unwrap_or(false) {
        let resource = state.registry.get(&id).ok_or_else(ApiError::model_not_found)?;
        let estimator = match (resource.status(), resource.estimator()) {
            (ModelStatus::Completed, Some(est)) => est.clone(),
            _ => return Err(ApiError::model_not_ready()),
        };
        let file_name = params.file_name.unwrap_or_else(|| format!("{id}.json"));
        if !valid_export_name(&file_name) || file_name.contains('\\') {
            return Err(ApiError::invalid_request("file_name must be a plain file name"));
        }
        let path = state.export_dir.join(&file_name);
        let target = path.clone();
        tokio::task::spawn_blocking(move || estimator.save(&target))
            .await
            .map_err(|e| ApiError::internal(e.to_string()))??;
        info!(model_id=%id, path=%path.display(), "model exported");
        body.export = Some("OK");
    }
    Ok(Json(body))
}

pub async fn delete_model(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    state.registry.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_omits_empty_errors() {
        let view = ModelView { id: Uuid::nil(), status: ModelStatus::Completed, has_estimator: true, errors: vec![], deployed: true, is_default: false };
        let json = serde_json::to_value(ModelBody::from(view)).unwrap();
        assert_eq!(json, serde_json::json!({"id": Uuid::nil(), "status": "COMPLETED", "deployed": true}));
    }

    #[test]
    fn body_lists_errors_of_failed_models() {
        let view = ModelView {
            id: Uuid::nil(),
            status: ModelStatus::Failed,
            has_estimator: false,
            errors: vec![ResourceError::new("incorrect_columns", "missing MES")],
            deployed: false,
            is_default: false,
        };
        let json = serde_json::to_value(ModelBody::from(view)).unwrap();
        assert_eq!(json["errors"][0]["code"], "incorrect_columns");
    }

    #[test]
    fn export_names_must_be_plain_files() {
        assert!(valid_export_name("model.json"));
        for bad in ["", ".", "..", "../x.json", "a/b.json", "/tmp/x.json", "dir/"] {
            assert!(!valid_export_name(bad), "{bad:?} accepted");
        }
    }

    #[test]
    fn location_uses_host_when_present() {
        let id = Uuid::nil();
        assert_eq!(model_location(&HeaderMap::new(), id), format!("/v1/models/{id}"));
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "svc.local:8000".parse().unwrap());
        assert_eq!(model_location(&headers, id), format!("http://svc.local:8000/v1/models/{id}"));
    }

    #[test]
    fn malformed_ids_are_not_found() {
        assert_eq!(parse_id("not-a-uuid").unwrap_err().status, StatusCode::NOT_FOUND);
        assert!(parse_id(&Uuid::new_v4().to_string()).is_ok());
    }
}
