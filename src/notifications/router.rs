use axum::{Json, body::Bytes, extract::State, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{
    entities::{BroadcastReport, NotificationPayload, NotifyRequest},
    error::NotifyError,
};
use crate::context::AppContext;

const NOTIFICATIONS_TAG: &str = "notifications";

#[derive(Debug, Serialize, ToSchema)]
pub struct NotifyResponse {
    #[schema(example = "Notifications processed")]
    pub message: String,
    #[serde(flatten)]
    pub report: BroadcastReport,
}

pub fn router() -> OpenApiRouter<Arc<AppContext>> {
    OpenApiRouter::new().routes(routes!(notify))
}

#[utoipa::path(
    post,
    path = "/notify",
    request_body = NotifyRequest,
    responses(
        (status = 200, description = "Broadcast finished", body = NotifyResponse),
        (status = 400, description = "Body is not valid JSON"),
        (status = 500, description = "Server missing VAPID keys")
    ),
    tag = NOTIFICATIONS_TAG
)]
async fn notify(
    State(context): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<impl IntoResponse, NotifyError> {
    let notification_service = context
        .notification_service
        .as_ref()
        .ok_or(NotifyError::Unconfigured)?;

    let payload = parse_payload(&body)?;
    let report = notification_service.broadcast(&payload).await;

    Ok(Json(NotifyResponse {
        message: "Notifications processed".to_string(),
        report,
    }))
}

/// An empty body means "all defaults", like a body of `{}`. Only bodies that
/// are not JSON at all are rejected.
fn parse_payload(body: &[u8]) -> Result<NotificationPayload, NotifyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(NotificationPayload::default());
    }

    serde_json::from_slice::<Value>(body)
        .map(|value| NotificationPayload::from(NotifyRequest::from_value(&value)))
        .map_err(|err| NotifyError::InvalidPayload(err.to_string()))
}
