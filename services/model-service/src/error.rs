//! API error handling
//!
//! Every failure leaves the service as `{"errors": [{"code", "message", "status"}]}`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use delay_core::{EstimatorError, RegistryError, ResourceError};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, "invalid_request", msg) }

    pub fn invalid_data_source() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_data_source", "The specified data source either does not exist or could not be read")
    }

    pub fn incorrect_columns() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "incorrect_columns", "The specified data source does not contain the required columns")
    }

    pub fn model_not_ready() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "model_not_ready", "The model has not completed training")
    }

    pub fn unsupported_model() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "unsupported_model", "The model type specified is not supported")
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "operation_not_allowed", "The API key does not identify a user allowed to perform this operation")
    }

    pub fn forbidden(msg: impl Into<String>) -> Self { Self::new(StatusCode::FORBIDDEN, "forbidden", msg) }

    pub fn model_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "model_not_found", "A model with the specified ID could not be located")
    }

    pub fn conflict(code: &'static str, msg: impl Into<String>) -> Self { Self::new(StatusCode::CONFLICT, code, msg) }

    pub fn training_timeout() -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, "training_timeout", "Training did not finish within the configured timeout")
    }

    pub fn internal(msg: impl Into<String>) -> Self { Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg) }

    /// Form stored on a failed model resource.
    pub fn resource_error(&self) -> ResourceError { ResourceError::new(self.code, self.message.clone()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "errors": [{
                "code": self.code,
                "message": self.message,
                "status": self.status.as_u16().to_string(),
            }]
        }));
        (self.status, body).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => ApiError::model_not_found(),
            RegistryError::Forbidden(_) => ApiError::forbidden("The default model can not be removed"),
            RegistryError::InvalidTransition { .. } => ApiError::conflict("invalid_transition", err.to_string()),
            RegistryError::NotReady { .. } => ApiError::model_not_ready(),
            RegistryError::DuplicateId(_) => ApiError::conflict("duplicate_model", err.to_string()),
            RegistryError::Unseeded => ApiError::internal(err.to_string()),
        }
    }
}

impl From<EstimatorError> for ApiError {
    fn from(err: EstimatorError) -> Self {
        match err {
            EstimatorError::SourceUnreadable { .. } => ApiError::invalid_data_source(),
            EstimatorError::SchemaMismatch(_) => ApiError::incorrect_columns(),
            EstimatorError::UnsupportedFormat { .. } => ApiError::unsupported_model(),
            EstimatorError::Io(_) | EstimatorError::Task(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self { ApiError::invalid_request(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self { ApiError::invalid_request(rejection.body_text()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delay_core::ModelStatus;
    use uuid::Uuid;

    #[test]
    fn registry_errors_map_to_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(ApiError::from(RegistryError::NotFound(id)).status, StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(RegistryError::Forbidden(id)).status, StatusCode::FORBIDDEN);
        let not_ready = ApiError::from(RegistryError::NotReady { id, status: ModelStatus::Pending });
        assert_eq!((not_ready.status, not_ready.code), (StatusCode::BAD_REQUEST, "model_not_ready"));
        let terminal = RegistryError::InvalidTransition { id, from: ModelStatus::Failed, to: ModelStatus::Completed };
        assert_eq!(ApiError::from(terminal).status, StatusCode::CONFLICT);
    }

    #[test]
    fn estimator_errors_map_to_codes() {
        let unreadable = EstimatorError::SourceUnreadable { location: "x.csv".into(), reason: "gone".into() };
        assert_eq!(ApiError::from(unreadable).code, "invalid_data_source");
        assert_eq!(ApiError::from(EstimatorError::SchemaMismatch("MES".into())).code, "incorrect_columns");
        let pickle = EstimatorError::UnsupportedFormat { location: "m.pkl".into(), reason: "not json".into() };
        assert_eq!(ApiError::from(pickle).code, "unsupported_model");
    }

    #[test]
    fn resource_error_keeps_code_and_message() {
        let e = ApiError::incorrect_columns().resource_error();
        assert_eq!(e.code, "incorrect_columns");
        assert!(e.message.contains("required columns"));
    }
}
