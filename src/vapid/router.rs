use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::context::AppContext;

const VAPID_TAG: &str = "vapid";

#[derive(Debug, Serialize, ToSchema)]
pub struct VapidPublicKeyResponse {
    /// Base64url application server key, empty when the server has none
    pub key: String,
}

pub fn router() -> OpenApiRouter<Arc<AppContext>> {
    OpenApiRouter::new().routes(routes!(get_public_key))
}

#[utoipa::path(
    get,
    path = "/vapidPublicKey",
    responses(
        (status = 200, description = "VAPID public key", body = VapidPublicKeyResponse)
    ),
    tag = VAPID_TAG
)]
async fn get_public_key(State(context): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(VapidPublicKeyResponse {
        key: context.vapid_public_key.clone(),
    })
}
