use axum::http::Method;

use super::*;
use super::test_support::{request, send, test_app};

#[test]
fn error_response_wraps_message() {
    let response = error_response(StatusCode::CONFLICT, "Event is at capacity");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[test]
fn service_error_masks_server_faults() {
    let err = std::io::Error::other("password authentication failed for user \"eas\"");
    assert_eq!(service_error(StatusCode::INTERNAL_SERVER_ERROR, &err).status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn service_error_body_hides_server_detail() {
    let err = std::io::Error::other("connection reset");
    let response = service_error(StatusCode::INTERNAL_SERVER_ERROR, &err);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let response = send(test_app(), request(Method::GET, "/nope", None, None)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn routes_live_under_versioned_prefix() {
    let app = test_app();
    let response = send(
        app,
        axum::http::Request::builder().uri("/info").body(axum::body::Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let app = test_app();
    let preflight = axum::http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/events")
        .header("origin", "https://easuniversity.site")
        .header("access-control-request-method", "POST")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = send(app, preflight).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers["access-control-allow-origin"], "*");
}
