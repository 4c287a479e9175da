use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use core_lib::CoreError;
use serde_json::json;
use tracing::{error, warn};

// Declare sub-modules within the application layer
pub mod authz;
pub mod handlers;
pub mod middleware;
pub mod ws;

// Top-level error type for the HTTP layer
#[derive(thiserror::Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),
}

impl ApplicationError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApplicationError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "Not signed in", m.clone()),
            ApplicationError::Forbidden(m) => (StatusCode::FORBIDDEN, "Not allowed", m.clone()),
            ApplicationError::Validation(m) => (StatusCode::BAD_REQUEST, "Invalid request", m.clone()),
            ApplicationError::NotFound(m) => (StatusCode::NOT_FOUND, "Not found", m.clone()),
            ApplicationError::Core(err) => match err {
                CoreError::NotFound(m) => (StatusCode::NOT_FOUND, "Not found", m.clone()),
                CoreError::Validation(m) => (StatusCode::BAD_REQUEST, "Invalid request", m.clone()),
                CoreError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "Not signed in", m.clone()),
                CoreError::Forbidden(m) => (StatusCode::FORBIDDEN, "Not allowed", m.clone()),
                CoreError::AlreadyExists(m) => (StatusCode::CONFLICT, "Already exists", m.clone()),
                CoreError::Backend { .. } => (StatusCode::BAD_GATEWAY, "Backend error", err.to_string()),
                CoreError::Webhook { .. } => (StatusCode::BAD_GATEWAY, "Automation failed", err.to_string()),
                CoreError::Configuration(m) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "Not configured", m.clone())
                }
                CoreError::Serialization(_)
                | CoreError::Deserialization(_)
                | CoreError::Infrastructure(_)
                | CoreError::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    "An unexpected error occurred".to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let (status, title, description) = self.parts();
        if status.is_server_error() {
            error!(%status, "Request failed: {:?}", self);
        } else {
            warn!(%status, "Request rejected: {}", self);
        }
        let body = json!({"error": {"title": title, "description": description}});
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApplicationError {
    fn from(rejection: JsonRejection) -> Self {
        ApplicationError::Validation(rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApplicationError))]
pub struct ApiJson<T>(pub T);

pub type ApiResult<T> = Result<T, ApplicationError>;
