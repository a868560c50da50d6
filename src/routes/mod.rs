//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every endpoint lives under `/api/v1` and answers JSON, except the CSV
//! attendance export. Handlers stay thin: they extract the caller, delegate
//! to `services::*`, and map service errors to status codes through the
//! per-module `*_error_to_status` helpers.

pub mod attendance;
pub mod auth;
pub mod campuses;
pub mod context;
pub mod dashboard;
pub mod events;
pub mod geocode;
pub mod health;

#[cfg(test)]
pub(crate) mod test_support;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub const API_PREFIX: &str = "/api/v1";

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/info", get(health::info))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/register", post(auth::register))
        .route("/auth/profile", get(auth::profile).patch(auth::update_profile))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/verify-token", post(auth::verify_token))
        .route("/auth/users", get(auth::list_users))
        .route("/campuses", get(campuses::list_campuses))
        .route("/campuses/accessible", get(campuses::accessible_campuses))
        .route("/campuses/{id}", get(campuses::get_campus))
        .route("/campuses/{id}/statistics", get(campuses::campus_statistics))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/{id}",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/{id}/qr", get(events::event_qr))
        .route(
            "/events/{id}/attendance",
            get(attendance::list_for_event).post(attendance::submit),
        )
        .route("/events/{id}/attendance/export.csv", get(attendance::export_csv))
        .route("/attendance/mine", get(attendance::list_mine))
        .route("/attendance/{id}/verify", post(attendance::verify))
        .route("/attendance/{id}/reject", post(attendance::reject))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/geocode/reverse", get(geocode::reverse))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(API_PREFIX, api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `{"error": message}` with the given status.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Error body for a service failure. Server faults are logged and masked.
pub(crate) fn service_error(status: StatusCode, err: &dyn std::error::Error) -> Response {
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
        return error_response(status, "Internal server error");
    }
    error_response(status, err.to_string())
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
