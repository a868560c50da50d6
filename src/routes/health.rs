//! Unauthenticated health and info endpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use time::OffsetDateTime;

use crate::state::AppState;

const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const API_NAME: &str = "EAS Multi-Campus Event Attendance System API";

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub version: &'static str,
    pub database: &'static str,
    pub message: &'static str,
}

/// `GET /health`: 503 when the database does not answer in time.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let database = match tokio::time::timeout(DB_PROBE_TIMEOUT, crate::db::ping(&state.pool)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("probe timed out".to_owned()),
    };
    if let Err(e) = &database {
        tracing::warn!(error = %e, "health check database probe failed");
    }

    let (status, label, database) = match database {
        Ok(()) => (StatusCode::OK, "healthy", "healthy"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "degraded", "error"),
    };
    (
        status,
        Json(Health {
            status: label,
            timestamp: OffsetDateTime::now_utc(),
            version: env!("CARGO_PKG_VERSION"),
            database,
            message: "EAS API is running",
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct ApiInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: BTreeMap<&'static str, String>,
    pub support: &'static str,
}

pub(crate) fn api_info() -> ApiInfo {
    let endpoints = ["auth", "campuses", "events", "attendance", "dashboard", "health", "info"]
        .into_iter()
        .map(|name| (name, format!("{}/{name}", super::API_PREFIX)))
        .collect();
    ApiInfo {
        name: API_NAME,
        version: env!("CARGO_PKG_VERSION"),
        description: "Multi-campus event attendance with GPS, selfie and signature verification",
        endpoints,
        support: "Multi-campus architecture with role-based access control",
    }
}

/// `GET /info`
pub async fn info() -> Json<ApiInfo> {
    Json(api_info())
}

#[cfg(test)]
#[path = "health_test.rs"]
mod tests;
