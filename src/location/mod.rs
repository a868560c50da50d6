//! Location capture: the picker that produces a Selected Location.
//!
//! ARCHITECTURE
//! ============
//! The picker is a state machine over two seams: a [`GeolocationProvider`]
//! (the device position API) and a [`MapSurface`] (the map rendering
//! library). The surface reports user input as [`MapEvent`]s; the owner
//! steers the picker through a [`PickerHandle`]. Every accepted change is
//! reported to the owner's callback as a fresh [`SelectedLocation`].
//!
//! LIFECYCLE
//! =========
//! `Uninitialized -> AwaitingGeolocation -> MapLoading -> Ready -> TornDown`.
//! Seeded mounts skip `AwaitingGeolocation`. The phase never moves backwards;
//! a new mount means a new picker.
//!
//! TRADE-OFFS
//! ==========
//! Geolocation failure still resolves to the fixed fallback coordinate so the
//! attendance form stays usable, but the emitted location is tagged
//! [`LocationSource::Fallback`] with the reason, and attendance validation
//! refuses to treat it as a real GPS reading.

pub mod geocoder;
pub mod geolocation;
pub mod headless;
pub mod picker;
pub mod surface;

use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, format_fixed6};

pub use geocoder::{GeocodeError, MapboxGeocoder, ReverseGeocoder};
pub use geolocation::{GeolocationError, GeolocationOptions, GeolocationProvider};
pub use picker::{LocationPicker, PickerError, PickerHandle};
pub use surface::{MapEvent, MapSurface};

/// Where a Selected Location came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationSource {
    /// Live device reading.
    Device { accuracy_m: Option<f64> },
    /// Device reading failed; the fixed campus coordinate was substituted.
    Fallback { reason: GeolocationError },
    /// Supplied by the owner at mount time.
    Seeded,
    MapClick,
    MarkerDrag,
    /// Forced through [`PickerHandle::set_location`].
    External,
}

impl LocationSource {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Reported device accuracy, when the source carries one.
    #[must_use]
    pub fn accuracy_m(&self) -> Option<f64> {
        match self {
            Self::Device { accuracy_m } => *accuracy_m,
            _ => None,
        }
    }

    /// Short label stored alongside attendance records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device { .. } => "device",
            Self::Fallback { .. } => "fallback",
            Self::Seeded => "seeded",
            Self::MapClick => "map_click",
            Self::MarkerDrag => "marker_drag",
            Self::External => "external",
        }
    }
}

/// Coordinate plus display address: the unit of output of the picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedLocation {
    pub coordinate: Coordinate,
    pub address: String,
    pub source: LocationSource,
}

impl SelectedLocation {
    /// New selection whose address is the six-decimal coordinate string.
    #[must_use]
    pub fn new(coordinate: Coordinate, source: LocationSource) -> Self {
        Self { coordinate, address: format_fixed6(coordinate), source }
    }

    /// Replace the placeholder address when a non-blank one is available.
    #[must_use]
    pub fn with_address(mut self, address: Option<String>) -> Self {
        if let Some(address) = address.filter(|a| !a.trim().is_empty()) {
            self.address = address;
        }
        self
    }
}
