use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use atelier_core::og::OgImageError;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant renders as `{"error": "<message>"}` so Axum handlers can
/// return `Result<impl IntoResponse, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// Server-side failure whose message is safe to show the client.
    #[error("{0}")]
    Failed(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<OgImageError> for AppError {
    fn from(err: OgImageError) -> Self {
        let message = err.to_string();
        match err {
            OgImageError::MissingUrl
            | OgImageError::InvalidUrl
            | OgImageError::NotAnImage
            | OgImageError::TooLarge => AppError::Unprocessable(message),
            OgImageError::NoImage => AppError::NotFound(message),
            OgImageError::FetchFailed | OgImageError::DownloadFailed => {
                AppError::BadGateway(message)
            }
            OgImageError::Storage => AppError::Failed(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Failed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
