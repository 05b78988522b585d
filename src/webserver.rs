use anyhow::{Context, Result};
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;
use utoipa::{
    OpenApi,
    openapi::{Info, OpenApiBuilder},
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::{context::AppContext, notifications, settings::WebserverSettings, subscriptions, vapid};

#[derive(OpenApi)]
struct ApiDoc;

pub async fn start(
    settings: &WebserverSettings,
    static_dir: impl AsRef<Path>,
    context: AppContext,
) -> Result<()> {
    let router = build_router(Arc::new(context), static_dir.as_ref());

    let host = settings
        .host
        .parse()
        .with_context(|| format!("Invalid webserver host {}", settings.host))?;
    let addr = SocketAddr::new(host, settings.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let server = axum::serve(listener, router.into_make_service());

    let socket_addr = server.local_addr()?;
    info!(
        "Starting webserver on {}:{}",
        settings.host,
        socket_addr.port()
    );
    info!("Endpoints: GET /vapidPublicKey, POST /subscribe, POST /notify");

    server.await.context("Server error")?;

    Ok(())
}

/// API routes, Swagger UI and the browser client. Unknown GET paths, and GET on
/// paths that only accept POST, serve `index.html` from `static_dir`.
pub fn build_router(context: Arc<AppContext>, static_dir: &Path) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(vapid::router())
        .merge(subscriptions::router())
        .merge(notifications::router())
        .with_state(context)
        .split_for_parts();

    let api = OpenApiBuilder::from(api)
        .info(Info::new("Web Push Demo Server API", "0.1.0"))
        .build();

    let index = ServeFile::new(static_dir.join("index.html"));
    let client = ServeDir::new(static_dir).fallback(index.clone());

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .method_not_allowed_fallback(move |request: Request<Body>| {
            serve_index_on_get(index.clone(), request)
        })
        .fallback_service(client)
        .layer(from_fn(error_logging_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn serve_index_on_get(index: ServeFile, request: Request<Body>) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match index.oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

async fn error_logging_middleware(request: Request<Body>, next: Next) -> impl IntoResponse {
    let path = request.uri().path().to_owned();
    let method = request.method().clone();

    let response = next.run(request).await;

    if !response.status().is_success() {
        let status = response.status();

        tracing::error!(
            status = ?status,
            path = %path,
            method = %method,
            "Request error"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::inmemory::InMemoryDatabase;
    use crate::notifications::gateway::{MockPushGateway, NotificationError, PushGateway};
    use crate::subscriptions::database::SubscriptionDatabase;
    use axum::http::header;
    use serde_json::{Value, json};

    fn static_dir() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("public")
    }

    fn test_router(
        db: Arc<InMemoryDatabase>,
        gateway: Option<Arc<dyn PushGateway>>,
        public_key: &str,
    ) -> Router {
        let context = AppContext::new(db, gateway, public_key.to_string(), 8);
        build_router(Arc::new(context), &static_dir())
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn descriptor(n: u32) -> Value {
        json!({
            "endpoint": format!("https://push.example.com/sub{}", n),
            "expirationTime": null,
            "keys": { "p256dh": "BPk", "auth": "secret" }
        })
    }

    #[tokio::test]
    async fn test_vapid_public_key() {
        let router = test_router(Arc::new(InMemoryDatabase::new()), None, "BPublicKey");

        let response = router
            .oneshot(Request::get("/vapidPublicKey").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({ "key": "BPublicKey" }));
    }

    #[tokio::test]
    async fn test_vapid_public_key_unconfigured_is_empty() {
        let router = test_router(Arc::new(InMemoryDatabase::new()), None, "");

        let response = router
            .oneshot(Request::get("/vapidPublicKey").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(read_json(response).await, json!({ "key": "" }));
    }

    #[tokio::test]
    async fn test_subscribe() {
        let db = Arc::new(InMemoryDatabase::new());
        let router = test_router(db.clone(), None, "");

        let response = router
            .clone()
            .oneshot(json_request("/subscribe", descriptor(1)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(read_json(response).await, json!({ "ok": true }));

        let response = router
            .oneshot(json_request("/subscribe", descriptor(1)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        assert_eq!(db.count_subscriptions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_without_endpoint() {
        let db = Arc::new(InMemoryDatabase::new());
        let router = test_router(db.clone(), None, "");

        let response = router
            .oneshot(json_request("/subscribe", json!({ "keys": {} })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({ "error": "Invalid subscription" })
        );
        assert_eq!(db.count_subscriptions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_without_json_content_type() {
        let db = Arc::new(InMemoryDatabase::new());
        let router = test_router(db.clone(), None, "");

        let response = router
            .oneshot(
                Request::post("/subscribe")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({ "error": "Invalid subscription" })
        );
        assert_eq!(db.count_subscriptions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_descriptor_without_content_type_header() {
        let db = Arc::new(InMemoryDatabase::new());
        let router = test_router(db.clone(), None, "");

        let response = router
            .oneshot(
                Request::post("/subscribe")
                    .body(Body::from(descriptor(1).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await,
            json!({ "error": "Invalid subscription" })
        );
        assert_eq!(db.count_subscriptions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe_with_malformed_json() {
        let router = test_router(Arc::new(InMemoryDatabase::new()), None, "");

        for uri in ["/subscribe", "/unsubscribe"] {
            let response = router
                .clone()
                .oneshot(
                    Request::post(uri)
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(r#"{"endpoint": "#))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "POST {}", uri);
            assert_eq!(
                read_json(response).await,
                json!({ "error": "Invalid subscription" })
            );
        }
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let db = Arc::new(InMemoryDatabase::new());
        let router = test_router(db.clone(), None, "");

        router
            .clone()
            .oneshot(json_request("/subscribe", descriptor(1)))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(json_request("/unsubscribe", descriptor(1)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            json!({ "ok": true, "removed": true })
        );

        let response = router
            .oneshot(json_request("/unsubscribe", descriptor(1)))
            .await
            .unwrap();
        assert_eq!(
            read_json(response).await,
            json!({ "ok": true, "removed": false })
        );
        assert_eq!(db.count_subscriptions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_notify_without_vapid_keys() {
        let router = test_router(Arc::new(InMemoryDatabase::new()), None, "");

        let response = router
            .oneshot(json_request("/notify", json!({ "title": "Hi" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(response).await,
            json!({ "error": "Server missing VAPID keys" })
        );
    }

    #[tokio::test]
    async fn test_notify_reports_and_prunes() {
        let db = Arc::new(InMemoryDatabase::new());
        let mut mock_gateway = MockPushGateway::new();
        mock_gateway
            .expect_send()
            .times(3)
            .returning(|subscription, _| match subscription.endpoint() {
                "https://push.example.com/sub1" => Ok(()),
                "https://push.example.com/sub2" => Err(NotificationError::Gone(410)),
                _ => Err(NotificationError::SendFailure("HTTP 503".to_string())),
            });
        let gateway: Arc<dyn PushGateway> = Arc::new(mock_gateway);
        let router = test_router(db.clone(), Some(gateway), "BPublicKey");

        for n in 1..=3 {
            router
                .clone()
                .oneshot(json_request("/subscribe", descriptor(n)))
                .await
                .unwrap();
        }

        let response = router
            .oneshot(json_request("/notify", json!({ "title": "Hi" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            json!({
                "message": "Notifications processed",
                "successCount": 1,
                "failureCount": 2
            })
        );
        assert_eq!(db.count_subscriptions().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_notify_with_empty_body_and_no_subscribers() {
        let mut mock_gateway = MockPushGateway::new();
        mock_gateway.expect_send().never();
        let gateway: Arc<dyn PushGateway> = Arc::new(mock_gateway);
        let router = test_router(Arc::new(InMemoryDatabase::new()), Some(gateway), "BPublicKey");

        let response = router
            .oneshot(Request::post("/notify").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            json!({
                "message": "Notifications processed",
                "successCount": 0,
                "failureCount": 0
            })
        );
    }

    #[tokio::test]
    async fn test_notify_with_loose_json_uses_defaults() {
        let db = Arc::new(InMemoryDatabase::new());
        let mut mock_gateway = MockPushGateway::new();
        mock_gateway
            .expect_send()
            .times(2)
            .withf(|_, payload| {
                let message: Value = serde_json::from_slice(payload).unwrap();
                message["title"] == "Notification" && message["url"] == "/"
            })
            .returning(|_, _| Ok(()));
        let gateway: Arc<dyn PushGateway> = Arc::new(mock_gateway);
        let router = test_router(db.clone(), Some(gateway), "BPublicKey");

        router
            .clone()
            .oneshot(json_request("/subscribe", descriptor(1)))
            .await
            .unwrap();

        for body in [json!([1, 2]), json!({ "title": 5 })] {
            let response = router
                .clone()
                .oneshot(json_request("/notify", body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                read_json(response).await,
                json!({
                    "message": "Notifications processed",
                    "successCount": 1,
                    "failureCount": 0
                })
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_get_serves_index() {
        let router = test_router(Arc::new(InMemoryDatabase::new()), None, "");

        let response = router
            .oneshot(Request::get("/some/client/route").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("subscribeBtn"));
    }

    #[tokio::test]
    async fn test_get_on_api_path_serves_index() {
        let router = test_router(Arc::new(InMemoryDatabase::new()), None, "");

        for path in ["/notify", "/subscribe", "/unsubscribe"] {
            let response = router
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK, "GET {}", path);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert!(String::from_utf8_lossy(&bytes).contains("subscribeBtn"));
        }
    }

    #[tokio::test]
    async fn test_other_methods_on_api_path_are_not_allowed() {
        let router = test_router(Arc::new(InMemoryDatabase::new()), None, "");

        let response = router
            .oneshot(Request::delete("/notify").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_static_asset_is_served() {
        let router = test_router(Arc::new(InMemoryDatabase::new()), None, "");

        let response = router
            .oneshot(Request::get("/sw.js").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("addEventListener('push'"));
    }
}
