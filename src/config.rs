//! Application configuration parsed from environment variables.
//!
//! Every knob has a default except `DATABASE_URL`, which only the commands
//! that touch Postgres require. Parsing goes through a lookup function so
//! tests can feed a map instead of mutating the process environment.

use std::time::Duration;

use time::UtcOffset;

use crate::geo::{Coordinate, GeoError};
use crate::location::geocoder::DEFAULT_MAPBOX_BASE_URL;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MOCK_AUTH_DELAY_MS: u64 = 500;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const DEFAULT_QR_BASE_URL: &str = "https://easuniversity.site";
/// SNSU main campus, Surigao City.
pub const DEFAULT_FALLBACK_LAT: f64 = 9.7893;
pub const DEFAULT_FALLBACK_LNG: f64 = 125.4954;
/// Asia/Manila has no daylight saving; a fixed offset is exact.
pub const DEFAULT_EVENT_UTC_OFFSET_HOURS: i8 = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid fallback coordinate: {0}")]
    Fallback(#[from] GeoError),
}

/// Which [`crate::services::auth::AuthBackend`] the server runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthBackendKind {
    /// Postgres users with bcrypt hashes and server-side sessions.
    Session,
    /// Static fixture users with placeholder tokens. Development only.
    Mock,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub port: u16,
    pub db_max_connections: u32,
    pub auth_backend: AuthBackendKind,
    pub mock_auth_delay: Duration,
    pub session_ttl: time::Duration,
    pub cookie_secure: bool,
    /// Read the client address from `X-Real-IP` / `X-Forwarded-For`.
    /// Only safe behind a reverse proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
    pub qr_base_url: String,
    pub fallback: Coordinate,
    /// Offset at which event dates and clock times are interpreted.
    pub event_offset: UtcOffset,
    pub mapbox_access_token: Option<String>,
    pub mapbox_base_url: String,
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let auth_backend = parse_auth_backend(get("AUTH_BACKEND").as_deref())?;
        let fallback = Coordinate::new(
            parse_or(get("FALLBACK_LAT"), "FALLBACK_LAT", DEFAULT_FALLBACK_LAT)?,
            parse_or(get("FALLBACK_LNG"), "FALLBACK_LNG", DEFAULT_FALLBACK_LNG)?,
        )?;

        let offset_hours = parse_or(get("EVENT_UTC_OFFSET_HOURS"), "EVENT_UTC_OFFSET_HOURS", DEFAULT_EVENT_UTC_OFFSET_HOURS)?;
        let event_offset = UtcOffset::from_hms(offset_hours, 0, 0).map_err(|_| ConfigError::Invalid {
            key: "EVENT_UTC_OFFSET_HOURS",
            value: offset_hours.to_string(),
        })?;

        let flag = |key: &'static str| match get(key) {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { key, value: raw }),
            None => Ok(false),
        };
        let cookie_secure = flag("COOKIE_SECURE")?;
        let trust_proxy_headers = flag("TRUST_PROXY_HEADERS")?;

        Ok(Self {
            database_url: get("DATABASE_URL"),
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            db_max_connections: parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            auth_backend,
            mock_auth_delay: Duration::from_millis(parse_or(
                get("MOCK_AUTH_DELAY_MS"),
                "MOCK_AUTH_DELAY_MS",
                DEFAULT_MOCK_AUTH_DELAY_MS,
            )?),
            session_ttl: time::Duration::hours(parse_or(
                get("SESSION_TTL_HOURS"),
                "SESSION_TTL_HOURS",
                DEFAULT_SESSION_TTL_HOURS,
            )?),
            cookie_secure,
            trust_proxy_headers,
            qr_base_url: get("QR_BASE_URL")
                .unwrap_or_else(|| DEFAULT_QR_BASE_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            fallback,
            event_offset,
            mapbox_access_token: get("MAPBOX_ACCESS_TOKEN"),
            mapbox_base_url: get("MAPBOX_BASE_URL").unwrap_or_else(|| DEFAULT_MAPBOX_BASE_URL.to_owned()),
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `DATABASE_URL` is unset.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            port: DEFAULT_PORT,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            auth_backend: AuthBackendKind::Session,
            mock_auth_delay: Duration::from_millis(DEFAULT_MOCK_AUTH_DELAY_MS),
            session_ttl: time::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            cookie_secure: false,
            trust_proxy_headers: false,
            qr_base_url: DEFAULT_QR_BASE_URL.to_owned(),
            fallback: Coordinate::from_static(DEFAULT_FALLBACK_LAT, DEFAULT_FALLBACK_LNG),
            event_offset: time::macros::offset!(+8),
            mapbox_access_token: None,
            mapbox_base_url: DEFAULT_MAPBOX_BASE_URL.to_owned(),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_auth_backend(raw: Option<&str>) -> Result<AuthBackendKind, ConfigError> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None | Some("session") => Ok(AuthBackendKind::Session),
        Some("mock") => Ok(AuthBackendKind::Mock),
        Some(other) => Err(ConfigError::Invalid { key: "AUTH_BACKEND", value: other.to_owned() }),
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an environment variable, falling back to `default` when absent or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
