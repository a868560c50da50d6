//! Campus registry, per-campus configuration and campus-aware access rules.
//!
//! ACCESS MODEL
//! ============
//! - `super_admin`: every campus
//! - `campus_admin` with an explicit list: exactly that list
//! - everyone else (and admins without a list): their own campus
//!
//! Admins may switch the campus they are working in with the `X-Campus-ID`
//! header; [`resolve_campus`] decides whether that request is honoured.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::accounts::{Role, UserProfile};
use crate::geo::Coordinate;

pub const DEFAULT_QR_CODE_EXPIRY_HOURS: i32 = 24;
pub const DEFAULT_ATTENDANCE_WINDOW_MINUTES: i32 = 30;
pub const DEFAULT_GPS_RADIUS_METERS: i32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum CampusError {
    #[error("campus not found: {0}")]
    NotFound(i64),
    #[error("campus {0} is not accessible")]
    Forbidden(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Campus {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub domain: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub location: Option<Coordinate>,
    pub timezone: String,
    pub locale: String,
    pub is_active: bool,
    pub branding_config: serde_json::Value,
}

/// Compact form used in listings and response headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampusSummary {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub domain: String,
    pub is_active: bool,
}

impl From<&Campus> for CampusSummary {
    fn from(c: &Campus) -> Self {
        Self { id: c.id, name: c.name.clone(), code: c.code.clone(), domain: c.domain.clone(), is_active: c.is_active }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampusConfiguration {
    pub campus_id: i64,
    pub multi_campus_events_enabled: bool,
    pub cross_campus_attendance_enabled: bool,
    pub qr_code_expiry_hours: i32,
    pub attendance_window_minutes: i32,
    pub email_notifications_enabled: bool,
    pub sms_notifications_enabled: bool,
    pub gps_validation_enabled: bool,
    pub gps_radius_meters: i32,
}

impl CampusConfiguration {
    /// Configuration used when a campus has no stored row.
    #[must_use]
    pub fn defaults_for(campus_id: i64) -> Self {
        Self {
            campus_id,
            multi_campus_events_enabled: false,
            cross_campus_attendance_enabled: false,
            qr_code_expiry_hours: DEFAULT_QR_CODE_EXPIRY_HOURS,
            attendance_window_minutes: DEFAULT_ATTENDANCE_WINDOW_MINUTES,
            email_notifications_enabled: true,
            sms_notifications_enabled: false,
            gps_validation_enabled: true,
            gps_radius_meters: DEFAULT_GPS_RADIUS_METERS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CountBreakdown {
    pub total: i64,
    pub by_kind: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceTotals {
    pub total: i64,
    pub verified: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampusStatistics {
    pub campus: CampusSummary,
    /// Active users, broken down by role.
    pub users: CountBreakdown,
    /// Published events, broken down by event type.
    pub events: CountBreakdown,
    pub attendance: AttendanceTotals,
}

// =============================================================================
// ACCESS RULES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampusAccess {
    /// Every active campus.
    All,
    Only(Vec<i64>),
}

impl CampusAccess {
    #[must_use]
    pub fn allows(&self, campus_id: i64) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(&campus_id),
        }
    }
}

#[must_use]
pub fn campus_access(user: &UserProfile) -> CampusAccess {
    match user.role {
        Role::SuperAdmin => CampusAccess::All,
        Role::CampusAdmin if !user.accessible_campus_ids.is_empty() => {
            CampusAccess::Only(user.accessible_campus_ids.clone())
        }
        _ => CampusAccess::Only(vec![user.campus_id]),
    }
}

#[must_use]
pub fn can_access_campus(user: &UserProfile, campus_id: i64) -> bool {
    campus_access(user).allows(campus_id)
}

/// Campus a request operates in: the requested override when the user is an
/// admin who can access it, otherwise the user's own campus.
#[must_use]
pub fn resolve_campus(user: &UserProfile, requested: Option<i64>) -> i64 {
    match requested {
        Some(id) if user.role.is_admin() && can_access_campus(user, id) => id,
        _ => user.campus_id,
    }
}

// =============================================================================
// QUERIES
// =============================================================================

const CAMPUS_COLUMNS: &str =
    "id, name, code, domain, address, phone, email, latitude, longitude, timezone, locale, is_active, branding_config";

fn campus_from_row(row: &PgRow) -> Result<Campus, sqlx::Error> {
    Ok(Campus {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        domain: row.try_get("domain")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        location: Coordinate::from_columns(row.try_get("latitude")?, row.try_get("longitude")?),
        timezone: row.try_get("timezone")?,
        locale: row.try_get("locale")?,
        is_active: row.try_get("is_active")?,
        branding_config: row.try_get("branding_config")?,
    })
}

/// Campuses the access rule allows. `All` includes inactive campuses so
/// super admins can manage them.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_campuses(pool: &PgPool, access: &CampusAccess) -> Result<Vec<Campus>, CampusError> {
    let rows = match access {
        CampusAccess::All => {
            sqlx::query(&format!("SELECT {CAMPUS_COLUMNS} FROM campuses ORDER BY id"))
                .fetch_all(pool)
                .await?
        }
        CampusAccess::Only(ids) => {
            sqlx::query(&format!(
                "SELECT {CAMPUS_COLUMNS} FROM campuses WHERE id = ANY($1) AND is_active ORDER BY id"
            ))
            .bind(ids)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows.iter().map(campus_from_row).collect::<Result<_, _>>()?)
}

/// # Errors
///
/// Returns [`CampusError::NotFound`] if no campus has this id.
pub async fn get_campus(pool: &PgPool, campus_id: i64) -> Result<Campus, CampusError> {
    let row = sqlx::query(&format!("SELECT {CAMPUS_COLUMNS} FROM campuses WHERE id = $1"))
        .bind(campus_id)
        .fetch_optional(pool)
        .await?
        .ok_or(CampusError::NotFound(campus_id))?;
    Ok(campus_from_row(&row)?)
}

/// Load a campus after checking the user may see it.
///
/// # Errors
///
/// Returns [`CampusError::Forbidden`] before touching the database if the
/// user has no access, or [`CampusError::NotFound`].
pub async fn get_accessible_campus(pool: &PgPool, user: &UserProfile, campus_id: i64) -> Result<Campus, CampusError> {
    if !can_access_campus(user, campus_id) {
        return Err(CampusError::Forbidden(campus_id));
    }
    get_campus(pool, campus_id).await
}

/// Stored configuration, or defaults when the campus has none.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_configuration<'e, E>(executor: E, campus_id: i64) -> Result<CampusConfiguration, CampusError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT campus_id, multi_campus_events_enabled, cross_campus_attendance_enabled, qr_code_expiry_hours,
                attendance_window_minutes, email_notifications_enabled, sms_notifications_enabled,
                gps_validation_enabled, gps_radius_meters
         FROM campus_configurations WHERE campus_id = $1",
    )
    .bind(campus_id)
    .fetch_optional(executor)
    .await?;

    let Some(row) = row else {
        return Ok(CampusConfiguration::defaults_for(campus_id));
    };
    Ok(CampusConfiguration {
        campus_id: row.try_get("campus_id")?,
        multi_campus_events_enabled: row.try_get("multi_campus_events_enabled")?,
        cross_campus_attendance_enabled: row.try_get("cross_campus_attendance_enabled")?,
        qr_code_expiry_hours: row.try_get("qr_code_expiry_hours")?,
        attendance_window_minutes: row.try_get("attendance_window_minutes")?,
        email_notifications_enabled: row.try_get("email_notifications_enabled")?,
        sms_notifications_enabled: row.try_get("sms_notifications_enabled")?,
        gps_validation_enabled: row.try_get("gps_validation_enabled")?,
        gps_radius_meters: row.try_get("gps_radius_meters")?,
    })
}

async fn grouped_counts(pool: &PgPool, sql: &str, campus_id: i64) -> Result<CountBreakdown, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64)>(sql)
        .bind(campus_id)
        .fetch_all(pool)
        .await?;
    let by_kind: BTreeMap<String, i64> = rows.into_iter().collect();
    Ok(CountBreakdown { total: by_kind.values().sum(), by_kind })
}

/// Users by role, published events by type, and attendance totals.
///
/// # Errors
///
/// Returns [`CampusError::NotFound`] or a database error.
pub async fn campus_statistics(pool: &PgPool, campus_id: i64) -> Result<CampusStatistics, CampusError> {
    let campus = get_campus(pool, campus_id).await?;

    let users = grouped_counts(
        pool,
        "SELECT role, COUNT(*) FROM users WHERE campus_id = $1 AND is_active GROUP BY role",
        campus_id,
    )
    .await?;
    let events = grouped_counts(
        pool,
        "SELECT event_type, COUNT(*) FROM events
         WHERE campus_id = $1 AND is_active AND status = 'published'
         GROUP BY event_type",
        campus_id,
    )
    .await?;
    let (total, verified) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_verified) FROM attendance WHERE campus_id = $1",
    )
    .bind(campus_id)
    .fetch_one(pool)
    .await?;

    Ok(CampusStatistics {
        campus: CampusSummary::from(&campus),
        users,
        events,
        attendance: AttendanceTotals { total, verified },
    })
}

#[cfg(test)]
#[path = "campus_test.rs"]
mod tests;
