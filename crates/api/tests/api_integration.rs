//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{
    CheckoutOrchestrator, CheckoutSettings, InMemoryMirrorStore, InMemoryPaymentProvider,
    MirrorStatus, ProviderOperation,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    router: axum::Router,
    provider: InMemoryPaymentProvider,
    mirror: InMemoryMirrorStore,
}

fn setup() -> TestApp {
    let provider = InMemoryPaymentProvider::new();
    let mirror = InMemoryMirrorStore::new();
    let orchestrator = CheckoutOrchestrator::with_mirror(
        provider.clone(),
        mirror.clone(),
        CheckoutSettings::new("https://app.example"),
    );
    let router = api::create_app(api::create_state(orchestrator), get_metrics_handle());
    TestApp {
        router,
        provider,
        mirror,
    }
}

fn setup_without_mirror() -> TestApp {
    let provider = InMemoryPaymentProvider::new();
    let mirror = InMemoryMirrorStore::new();
    let orchestrator: CheckoutOrchestrator<_, InMemoryMirrorStore> =
        CheckoutOrchestrator::new(provider.clone(), CheckoutSettings::new("https://app.example"));
    let router = api::create_app(api::create_state(orchestrator), get_metrics_handle());
    TestApp {
        router,
        provider,
        mirror,
    }
}

async fn post_json(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Creates a checkout through the API and returns the session ID the provider issued.
async fn start_checkout(app: &TestApp, uri: &str) -> String {
    let (status, body) = post_json(app, uri, json!({ "price": 1500, "userId": "user-1" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let url = body["url"].as_str().unwrap();
    url.rsplit('/').next().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["mirror_enabled"], true);
}

#[tokio::test]
async fn test_create_checkout_session() {
    let app = setup();

    let (status, body) = post_json(
        &app,
        "/create-checkout-session/Yoga",
        json!({ "price": 2000, "userId": "user-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let url = body["url"].as_str().unwrap();
    assert!(!url.is_empty());
    let session_id = url.rsplit('/').next().unwrap();
    assert!(app.mirror.get_record(session_id).is_some());
    assert_eq!(app.mirror.record_count(), 1);
}

#[tokio::test]
async fn test_create_subscription() {
    let app = setup();

    let (status, body) = post_json(
        &app,
        "/create-subscription/Premium",
        json!({ "price": 500, "userId": "user-2" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().is_some());
    assert_eq!(app.provider.product_count(), 1);
    assert_eq!(app.mirror.record_count(), 1);
}

#[tokio::test]
async fn test_missing_user_id_is_bad_request() {
    let app = setup();

    let (status, body) =
        post_json(&app, "/create-checkout-session/Yoga", json!({ "price": 2000 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "userId is required");
    assert_eq!(app.provider.total_calls(), 0);
}

#[tokio::test]
async fn test_blank_user_id_is_bad_request() {
    let app = setup();

    let (status, body) = post_json(
        &app,
        "/create-subscription/Premium",
        json!({ "price": 2000, "userId": "  " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "userId is required");
    assert_eq!(app.provider.total_calls(), 0);
    assert_eq!(app.mirror.register_attempts(), 0);
}

#[tokio::test]
async fn test_user_id_optional_without_mirror() {
    let app = setup_without_mirror();

    let (status, body) =
        post_json(&app, "/create-checkout-session/Yoga", json!({ "price": 2000 })).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().is_some());
    assert_eq!(app.mirror.register_attempts(), 0);
}

#[tokio::test]
async fn test_missing_price_is_bad_request() {
    let app = setup();

    let (status, body) = post_json(
        &app,
        "/create-subscription/Premium",
        json!({ "userId": "user-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "price is required");
    assert_eq!(app.provider.total_calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = setup();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/get-session-details")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_mirror_failure_returns_500_and_expires_session() {
    let app = setup();
    app.mirror.set_register_status(Some(MirrorStatus(503)));

    let (status, body) = post_json(
        &app,
        "/create-checkout-session/Yoga",
        json!({ "price": 2000, "userId": "user-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("503"));
    assert_eq!(app.provider.call_count(ProviderOperation::ExpireSession), 1);
    assert_eq!(app.mirror.record_count(), 0);
}

#[tokio::test]
async fn test_get_payment_details() {
    let app = setup();
    let session_id = start_checkout(&app, "/create-checkout-session/Yoga").await;
    let intent_id = app.provider.complete_session(&session_id).unwrap();

    let (status, body) = post_json(
        &app,
        "/get-payment-details",
        json!({ "sessionId": session_id }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paymentIntent"]["id"], intent_id.as_str());
    assert_eq!(body["paymentIntent"]["amount"], 1500);
}

#[tokio::test]
async fn test_get_subscription_details() {
    let app = setup();
    let session_id = start_checkout(&app, "/create-subscription/Premium").await;
    let subscription_id = app.provider.complete_session(&session_id).unwrap();

    let (status, body) = post_json(
        &app,
        "/get-subscription-details",
        json!({ "sessionId": session_id }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"]["id"], subscription_id.as_str());
    assert_eq!(body["subscription"]["status"], "active");
}

#[tokio::test]
async fn test_get_session_details() {
    let app = setup();
    let session_id = start_checkout(&app, "/create-checkout-session/Yoga").await;

    let (status, body) = post_json(
        &app,
        "/get-session-details",
        json!({ "sessionId": session_id }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["id"], session_id.as_str());
    assert_eq!(body["session"]["mode"], "payment");
}

#[tokio::test]
async fn test_unknown_session_is_server_error() {
    let app = setup();

    let (status, body) = post_json(
        &app,
        "/get-session-details",
        json!({ "sessionId": "cs_unknown" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("cs_unknown"));
}

#[tokio::test]
async fn test_cancel_subscription() {
    let app = setup();
    let session_id = start_checkout(&app, "/create-subscription/Premium").await;
    let subscription_id = app.provider.complete_session(&session_id).unwrap();

    let (status, body) = post_json(
        &app,
        "/cancel-subscription",
        json!({ "stripeSessionId": session_id }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().is_some());
    assert_eq!(
        app.provider.subscription_status(&subscription_id).as_deref(),
        Some("canceled")
    );
    assert_eq!(app.mirror.record_count(), 0);
}

#[tokio::test]
async fn test_cancel_without_session_id_is_bad_request() {
    let app = setup();

    let (status, body) = post_json(&app, "/cancel-subscription", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "stripeSessionId is required");
    assert_eq!(app.provider.total_calls(), 0);
}

#[tokio::test]
async fn test_cancel_payment_session_is_bad_request() {
    let app = setup();
    let session_id = start_checkout(&app, "/create-checkout-session/Yoga").await;

    let (status, _) = post_json(
        &app,
        "/cancel-subscription",
        json!({ "stripeSessionId": session_id }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.provider.call_count(ProviderOperation::CancelSubscription),
        0
    );
}

#[tokio::test]
async fn test_cancel_mirror_failure_is_server_error() {
    let app = setup();
    let session_id = start_checkout(&app, "/create-subscription/Premium").await;
    app.provider.complete_session(&session_id).unwrap();
    app.mirror.set_remove_status(Some(MirrorStatus(500)));

    let (status, _) = post_json(
        &app,
        "/cancel-subscription",
        json!({ "stripeSessionId": session_id }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        app.provider.call_count(ProviderOperation::CancelSubscription),
        1
    );
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    post_json(
        &app,
        "/create-checkout-session/Yoga",
        json!({ "price": 100, "userId": "user-1" }),
    )
    .await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
