//! Helpers for driving the router in tests with `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use crate::state::AppState;
use crate::state::test_helpers::test_app_state;

pub fn test_app() -> Router {
    super::app(test_app_state())
}

pub fn app_with(state: AppState) -> Router {
    super::app(state)
}

/// Build an `/api/v1` request with an optional JSON body and bearer token.
pub fn request(method: Method, path: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("{}{path}", super::API_PREFIX));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: Router, request: Request<Body>) -> TestResponse {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    TestResponse { status, headers, body }
}

/// Log a fixture user in through the router and return the token.
pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let body = serde_json::json!({ "email": email, "password": password });
    let response = send(app.clone(), request(Method::POST, "/auth/login", Some(body), None)).await;
    assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
    response.body["data"]["token"].as_str().unwrap().to_owned()
}

pub const STUDENT: (&str, &str) = ("student@snsu.edu.ph", "student123");
pub const ORGANIZER: (&str, &str) = ("organizer@snsu.edu.ph", "organizer123");
pub const SUPER_ADMIN: (&str, &str) = ("admin@snsu.edu.ph", "admin123");
pub const CAMPUS_ADMIN: (&str, &str) = ("campusadmin@malimono.snsu.edu.ph", "campusadmin123");
