//! Reverse geocoding: coordinate to human-readable address.
//!
//! The picker works without a geocoder (addresses fall back to the
//! six-decimal coordinate). When `MAPBOX_ACCESS_TOKEN` is configured the
//! server proxies lookups through [`MapboxGeocoder`] so the token never
//! reaches the browser. Parsing is a pure function for testability.

use std::time::Duration;

use crate::geo::Coordinate;

pub const DEFAULT_MAPBOX_BASE_URL: &str = "https://api.mapbox.com";
const REQUEST_TIMEOUT_SECS: u64 = 5;
const CONNECT_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("http client build failed: {0}")]
    HttpClientBuild(String),
    #[error("geocoding request failed: {0}")]
    Request(String),
    #[error("geocoding response error: status {status}")]
    Response { status: u16, body: String },
    #[error("geocoding response parse failed: {0}")]
    Parse(String),
}

/// Provider-neutral reverse geocoder. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Look up a display address. `Ok(None)` means the provider had no match.
    ///
    /// # Errors
    ///
    /// Returns a [`GeocodeError`] on transport or decoding failure.
    async fn address_for(&self, coordinate: Coordinate) -> Result<Option<String>, GeocodeError>;
}

// =============================================================================
// MAPBOX
// =============================================================================

pub struct MapboxGeocoder {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl MapboxGeocoder {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(access_token: String, base_url: &str) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeocodeError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, access_token, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn url_for(&self, coordinate: Coordinate) -> String {
        reverse_url(&self.base_url, coordinate)
    }
}

/// Mapbox places endpoint path. Mapbox takes longitude first.
pub(crate) fn reverse_url(base_url: &str, coordinate: Coordinate) -> String {
    format!(
        "{base_url}/geocoding/v5/mapbox.places/{},{}.json",
        coordinate.lng(),
        coordinate.lat()
    )
}

#[async_trait::async_trait]
impl ReverseGeocoder for MapboxGeocoder {
    async fn address_for(&self, coordinate: Coordinate) -> Result<Option<String>, GeocodeError> {
        let response = self
            .http
            .get(self.url_for(coordinate))
            .query(&[("access_token", self.access_token.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        if status != 200 {
            return Err(GeocodeError::Response { status, body: text });
        }

        parse_place_name(&text)
    }
}

/// Extract `features[0].place_name` from a Mapbox geocoding response.
pub(crate) fn parse_place_name(body: &str) -> Result<Option<String>, GeocodeError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| GeocodeError::Parse(e.to_string()))?;
    let Some(features) = value.get("features").and_then(serde_json::Value::as_array) else {
        return Err(GeocodeError::Parse("missing features array".into()));
    };
    Ok(features
        .first()
        .and_then(|f| f.get("place_name"))
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned))
}

#[cfg(test)]
#[path = "geocoder_test.rs"]
mod tests;
