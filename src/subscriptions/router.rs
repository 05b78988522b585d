use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{entities::SubscriptionDescriptorSchema, error::SubscriptionError};
use crate::context::AppContext;

const SUBSCRIPTIONS_TAG: &str = "subscriptions";

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscribeResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnsubscribeResponse {
    pub ok: bool,
    /// Whether the subscription was stored before the call
    pub removed: bool,
}

pub fn router() -> OpenApiRouter<Arc<AppContext>> {
    OpenApiRouter::new()
        .routes(routes!(subscribe))
        .routes(routes!(unsubscribe))
}

#[utoipa::path(
    post,
    path = "/subscribe",
    request_body = SubscriptionDescriptorSchema,
    responses(
        (status = 201, description = "Subscription stored", body = SubscribeResponse),
        (status = 400, description = "Invalid subscription"),
        (status = 500, description = "Internal server error")
    ),
    tag = SUBSCRIPTIONS_TAG
)]
async fn subscribe(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, SubscriptionError> {
    let descriptor = parse_descriptor(&headers, &body)?;
    context.subscription_service.subscribe(descriptor).await?;
    Ok((StatusCode::CREATED, Json(SubscribeResponse { ok: true })))
}

#[utoipa::path(
    post,
    path = "/unsubscribe",
    request_body = SubscriptionDescriptorSchema,
    responses(
        (status = 200, description = "Subscription removed if it was stored", body = UnsubscribeResponse),
        (status = 400, description = "Invalid subscription"),
        (status = 500, description = "Internal server error")
    ),
    tag = SUBSCRIPTIONS_TAG
)]
async fn unsubscribe(
    State(context): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, SubscriptionError> {
    let descriptor = parse_descriptor(&headers, &body)?;
    context
        .subscription_service
        .unsubscribe(descriptor)
        .await
        .map(|removed| Json(UnsubscribeResponse { ok: true, removed }))
}

/// Bodies that are not declared as JSON, or fail to parse, carry no endpoint.
fn parse_descriptor(headers: &HeaderMap, body: &[u8]) -> Result<Value, SubscriptionError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("json"));
    if !is_json {
        return Err(SubscriptionError::InvalidSubscription);
    }

    serde_json::from_slice(body).map_err(|_| SubscriptionError::InvalidSubscription)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[test]
    fn test_parse_descriptor() {
        let body = br#"{"endpoint":"https://push.example.com/1"}"#;

        assert_eq!(
            parse_descriptor(&headers("application/json"), body).unwrap(),
            json!({ "endpoint": "https://push.example.com/1" })
        );
        assert_eq!(
            parse_descriptor(&headers("application/json; charset=utf-8"), body).unwrap(),
            json!({ "endpoint": "https://push.example.com/1" })
        );
        assert!(matches!(
            parse_descriptor(&HeaderMap::new(), body),
            Err(SubscriptionError::InvalidSubscription)
        ));
        assert!(matches!(
            parse_descriptor(&headers("text/plain"), body),
            Err(SubscriptionError::InvalidSubscription)
        ));
        assert!(matches!(
            parse_descriptor(&headers("application/json"), b""),
            Err(SubscriptionError::InvalidSubscription)
        ));
        assert!(matches!(
            parse_descriptor(&headers("application/json"), b"{\"endpoint\":"),
            Err(SubscriptionError::InvalidSubscription)
        ));
    }
}
