use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Server missing VAPID keys")]
    Unconfigured,

    #[error("Invalid notification payload: {0}")]
    InvalidPayload(String),
}

impl IntoResponse for NotifyError {
    fn into_response(self) -> Response {
        error!("{}", self);
        let status = match self {
            NotifyError::Unconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            NotifyError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
