//! Geodetic primitives shared by the location picker and attendance validation.
//!
//! A [`Coordinate`] can only be built through [`Coordinate::new`] (or serde,
//! which routes through the same check), so a value of this type is always a
//! complete, in-range latitude/longitude pair.

use serde::{Deserialize, Serialize};

/// Mean earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("latitude out of range: {0}")]
    LatitudeOutOfRange(f64),
    #[error("longitude out of range: {0}")]
    LongitudeOutOfRange(f64),
}

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = GeoError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range components.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] naming the first component that is out of range.
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Const constructor for literals. Out-of-range input fails at compile time.
    #[must_use]
    pub const fn from_static(lat: f64, lng: f64) -> Self {
        assert!(lat >= -90.0 && lat <= 90.0 && lng >= -180.0 && lng <= 180.0);
        Self { lat, lng }
    }

    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[must_use]
    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Build from a nullable column pair. Both must be present and valid.
    #[must_use]
    pub fn from_columns(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).ok(),
            _ => None,
        }
    }
}

/// A device position reading with its reported horizontal accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub coordinate: Coordinate,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

/// Great-circle distance between two coordinates, in metres.
#[must_use]
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Display form used when no reverse-geocoded address is available.
#[must_use]
pub fn format_fixed6(c: Coordinate) -> String {
    format!("{:.6}, {:.6}", c.lat, c.lng)
}

#[cfg(test)]
#[path = "geo_test.rs"]
mod tests;
