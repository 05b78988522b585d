use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Invalid subscription")]
    InvalidSubscription,

    #[error("Database operation failed: {0}")]
    Database(String),
}

impl IntoResponse for SubscriptionError {
    fn into_response(self) -> Response {
        let status = match self {
            SubscriptionError::InvalidSubscription => StatusCode::BAD_REQUEST,
            SubscriptionError::Database(_) => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
