use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Error taxonomy shared by every feature. Maps 1:1 onto the status codes
/// documented for creation/destruction/webhook endpoints.
#[derive(Debug, thiserror::Error)]
pub enum VapiorcError {
    #[error("no available port in configured range")]
    NoAvailablePort,

    #[error("container engine launch failed: {0}")]
    LaunchError(String),

    #[error("no template for vm_type {0}")]
    TemplateMissing(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for VapiorcError {
    fn into_response(self) -> Response {
        let status = match &self {
            VapiorcError::NoAvailablePort => StatusCode::INTERNAL_SERVER_ERROR,
            VapiorcError::LaunchError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            VapiorcError::TemplateMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            VapiorcError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            VapiorcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            VapiorcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, VapiorcError>;
