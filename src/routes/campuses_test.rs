use axum::http::Method;

use super::*;
use crate::routes::test_support::{CAMPUS_ADMIN, ORGANIZER, STUDENT, login, request, send, test_app};

#[test]
fn campus_error_to_status_maps_variants() {
    assert_eq!(campus_error_to_status(&CampusError::NotFound(9)), StatusCode::NOT_FOUND);
    assert_eq!(campus_error_to_status(&CampusError::Forbidden(9)), StatusCode::FORBIDDEN);
    assert_eq!(
        campus_error_to_status(&CampusError::Database(sqlx::Error::RowNotFound)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn database_errors_are_masked() {
    let response = campus_error(CampusError::Database(sqlx::Error::PoolTimedOut));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn listing_requires_authentication() {
    let response = send(test_app(), request(Method::GET, "/campuses", None, None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_campus_is_forbidden() {
    let app = test_app();
    let token = login(&app, STUDENT.0, STUDENT.1).await;
    let response = send(app, request(Method::GET, "/campuses/3", None, Some(&token))).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "campus 3 is not accessible");
}

#[tokio::test]
async fn statistics_are_admin_only() {
    let app = test_app();
    let token = login(&app, ORGANIZER.0, ORGANIZER.1).await;
    let response = send(app, request(Method::GET, "/campuses/1/statistics", None, Some(&token))).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn campus_admin_statistics_stay_in_scope() {
    let app = test_app();
    let token = login(&app, CAMPUS_ADMIN.0, CAMPUS_ADMIN.1).await;
    let response = send(app, request(Method::GET, "/campuses/1/statistics", None, Some(&token))).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}
