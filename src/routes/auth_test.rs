use axum::http::{HeaderValue, Method};

use super::*;
use crate::routes::test_support::{CAMPUS_ADMIN, STUDENT, SUPER_ADMIN, login, request, send, test_app};

// =============================================================================
// token_from_headers
// =============================================================================

#[test]
fn bearer_token_wins_over_cookie() {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    headers.insert(header::COOKIE, HeaderValue::from_static("session_token=xyz"));
    assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
}

#[test]
fn cookie_used_without_bearer() {
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session_token=xyz"));
    assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));
}

#[test]
fn empty_or_foreign_schemes_are_ignored() {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
    assert_eq!(token_from_headers(&headers), None);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
    headers.insert(header::COOKIE, HeaderValue::from_static("session_token="));
    assert_eq!(token_from_headers(&headers), None);
}

// =============================================================================
// failure_status
// =============================================================================

#[test]
fn failure_status_maps_known_messages() {
    assert_eq!(failure_status(INVALID_CREDENTIALS), StatusCode::UNAUTHORIZED);
    assert_eq!(failure_status(NOT_AUTHENTICATED), StatusCode::UNAUTHORIZED);
    assert_eq!(failure_status(NOT_AUTHORIZED), StatusCode::FORBIDDEN);
    assert_eq!(failure_status(USER_NOT_FOUND), StatusCode::NOT_FOUND);
    assert_eq!(failure_status(EMAIL_TAKEN), StatusCode::CONFLICT);
    assert_eq!(failure_status(TOO_MANY_ATTEMPTS), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(failure_status(UNEXPECTED_ERROR), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn failure_status_defaults_to_bad_request() {
    assert_eq!(failure_status("Password must be at least 8 characters"), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Router
// =============================================================================

#[tokio::test]
async fn login_sets_cookie_and_returns_envelope() {
    let app = test_app();
    let body = serde_json::json!({ "email": STUDENT.0, "password": STUDENT.1 });
    let response = send(app, request(Method::POST, "/auth/login", Some(body), None)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    let token = response.body["data"]["token"].as_str().unwrap();
    assert!(token.starts_with("mock-jwt-token-3-"));
    assert_eq!(response.body["data"]["user"]["email"], STUDENT.0);

    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with(&format!("session_token={token}")));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=86400"));
}

#[tokio::test]
async fn wrong_password_is_unauthorized_failure() {
    let app = test_app();
    let body = serde_json::json!({ "email": STUDENT.0, "password": "nope" });
    let response = send(app, request(Method::POST, "/auth/login", Some(body), None)).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["message"], INVALID_CREDENTIALS);
    assert!(response.headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn repeated_failures_are_throttled() {
    let app = test_app();
    let body = serde_json::json!({ "email": "nobody@snsu.edu.ph", "password": "wrong-pass" });
    let mut last = StatusCode::OK;
    for _ in 0..11 {
        last = send(app.clone(), request(Method::POST, "/auth/login", Some(body.clone()), None)).await.status;
    }
    assert_eq!(last, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_reset_the_throttle() {
    let app = test_app();
    let body = serde_json::json!({ "email": STUDENT.0, "password": "wrong-pass" });
    let mut statuses = Vec::new();
    for i in 0..15 {
        let mut req = request(Method::POST, "/auth/login", Some(body.clone()), None);
        req.headers_mut()
            .insert("x-forwarded-for", format!("10.0.0.{i}").parse().unwrap());
        statuses.push(send(app.clone(), req).await.status);
    }
    assert!(statuses[..10].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert!(statuses[10..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn logout_clears_cookie_without_session() {
    let response = send(test_app(), request(Method::POST, "/auth/logout", None, None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn profile_requires_token() {
    let response = send(test_app(), request(Method::GET, "/auth/profile", None, None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = send(test_app(), request(Method::GET, "/auth/profile", None, Some("forged"))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_returns_current_user() {
    let app = test_app();
    let token = login(&app, STUDENT.0, STUDENT.1).await;
    let response = send(app, request(Method::GET, "/auth/profile", None, Some(&token))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["role"], "student");
}

#[tokio::test]
async fn verify_token_reports_validity() {
    let app = test_app();
    let response = send(app.clone(), request(Method::POST, "/auth/verify-token", None, None)).await;
    assert_eq!(response.body["data"]["valid"], false);

    let token = login(&app, STUDENT.0, STUDENT.1).await;
    let response = send(app, request(Method::POST, "/auth/verify-token", None, Some(&token))).await;
    assert_eq!(response.body["data"]["valid"], true);
}

#[tokio::test]
async fn register_rejects_short_password() {
    let body = serde_json::json!({
        "email": "new@snsu.edu.ph",
        "password": "short",
        "first_name": "Ana",
        "last_name": "Reyes",
        "campus_id": 1,
    });
    let response = send(test_app(), request(Method::POST, "/auth/register", Some(body), None)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn user_listing_is_admin_only() {
    let app = test_app();
    let token = login(&app, STUDENT.0, STUDENT.1).await;
    let response = send(app, request(Method::GET, "/auth/users", None, Some(&token))).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["message"], NOT_AUTHORIZED);
}

#[tokio::test]
async fn user_listing_scopes_campus_admins() {
    let app = test_app();
    let token = login(&app, SUPER_ADMIN.0, SUPER_ADMIN.1).await;
    let response = send(app.clone(), request(Method::GET, "/auth/users", None, Some(&token))).await;
    assert_eq!(response.body["data"].as_array().unwrap().len(), 4);

    let token = login(&app, CAMPUS_ADMIN.0, CAMPUS_ADMIN.1).await;
    let response = send(app, request(Method::GET, "/auth/users", None, Some(&token))).await;
    let users = response.body["data"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], CAMPUS_ADMIN.0);
}
