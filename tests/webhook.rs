//! Webhook Router Tests
//!
//! Drives the axum router in-process with `oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use common::{push_event, Harness, StaticFetcher};
use pushbuild::server::router;

async fn post(app: axum::Router, body: Vec<u8>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_webhook_success_body() {
    let h = Harness::new(StaticFetcher::serving(b"zip"));
    let app = router(h.orchestrator.clone(), "/webhook");

    let (status, body) = post(app, push_event(4242, "main")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bucket"], "mlops-cicd-source");
    assert_eq!(body["key"], "ip-demo/v1/source.zip");
    assert_eq!(body["projectName"], "ip-demo");
    assert_eq!(
        body["buildId"].as_str().unwrap(),
        h.builds.last_execution().unwrap().id
    );
}

#[tokio::test]
async fn test_webhook_rejects_bad_payload() {
    let h = Harness::new(StaticFetcher::serving(b"zip"));
    let app = router(h.orchestrator.clone(), "/webhook");

    let (status, body) = post(app, b"{}".to_vec()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
    assert!(body["message"].as_str().unwrap().contains("project"));
}

#[tokio::test]
async fn test_webhook_reports_fetch_failure() {
    let h = Harness::new(StaticFetcher::failing(404));
    let app = router(h.orchestrator.clone(), "/webhook");

    let (status, body) = post(app, push_event(1, "main")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "source_fetch_error");
    assert!(body["message"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new(StaticFetcher::serving(b"zip"));
    let app = router(h.orchestrator.clone(), "/webhook");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), b"ok");
}

#[tokio::test]
async fn test_webhook_requires_post() {
    let h = Harness::new(StaticFetcher::serving(b"zip"));
    let app = router(h.orchestrator.clone(), "/webhook");

    let response = app
        .oneshot(Request::builder().uri("/webhook").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(h.secrets.calls(), 0);
}
