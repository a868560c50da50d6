//! Reverse-geocoding proxy for the location picker.
//!
//! The browser never sees the provider token; it asks this endpoint instead.
//! A provider miss is not an error: the address falls back to the
//! six-decimal coordinate, exactly as the picker does offline.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Json, Response};
use serde::{Deserialize, Serialize};

use super::auth::AuthUser;
use super::error_response;
use crate::geo::{Coordinate, format_fixed6};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct ReverseResult {
    pub coordinate: Coordinate,
    pub address: String,
    /// `false` when the address is the coordinate placeholder.
    pub resolved: bool,
}

/// `GET /geocode/reverse?lat=&lng=`
pub async fn reverse(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ReverseQuery>,
) -> Result<Json<ReverseResult>, Response> {
    let coordinate =
        Coordinate::new(query.lat, query.lng).map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
    let Some(geocoder) = &state.geocoder else {
        return Err(error_response(StatusCode::SERVICE_UNAVAILABLE, "Geocoding is not configured"));
    };

    let address = geocoder.address_for(coordinate).await.map_err(|e| {
        tracing::warn!(error = %e, "reverse geocoding failed");
        error_response(StatusCode::BAD_GATEWAY, "Geocoding provider unavailable")
    })?;

    Ok(Json(match address {
        Some(address) => ReverseResult { coordinate, address, resolved: true },
        None => ReverseResult { coordinate, address: format_fixed6(coordinate), resolved: false },
    }))
}

#[cfg(test)]
#[path = "geocode_test.rs"]
mod tests;
