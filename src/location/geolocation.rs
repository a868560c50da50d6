//! Device geolocation seam.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geo::GpsFix;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAXIMUM_AGE_SECS: u64 = 60;

/// Options for the single position request made per mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocationOptions {
    pub high_accuracy: bool,
    /// Upper bound on the request; exceeding it counts as [`GeolocationError::Timeout`].
    pub timeout: Duration,
    /// Oldest cached position the provider may return.
    pub maximum_age: Duration,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            maximum_age: Duration::from_secs(DEFAULT_MAXIMUM_AGE_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("location request timed out")]
    Timeout,
    #[error("geolocation not supported")]
    Unsupported,
}

/// Provider-neutral position source. Enables fakes in tests.
#[async_trait::async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Request the current position once.
    ///
    /// # Errors
    ///
    /// Returns a [`GeolocationError`] when permission is refused, the
    /// platform has no fix, or the platform has no geolocation at all.
    async fn current_position(&self, options: &GeolocationOptions) -> Result<GpsFix, GeolocationError>;
}
