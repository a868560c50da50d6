//! Dashboard composition.
//!
//! [`compose`] is pure: it turns whatever counters were preloaded into the
//! widget list for a role, coalescing anything missing to zero or empty.
//! [`load`] fills only the counters the role's widgets read.

use serde::Serialize;
use sqlx::{PgPool, Row};
use time::{Date, OffsetDateTime, Time, UtcOffset};
use uuid::Uuid;

use super::accounts::{Role, UserProfile};
use super::attendance::AttendanceStatus;
use super::decode_text;

const LIST_LIMIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingEvent {
    pub id: Uuid,
    pub title: String,
    pub date: Date,
    #[serde(with = "super::event::clock_time")]
    pub start_time: Time,
    pub venue: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentAttendance {
    pub full_name: String,
    pub event_title: String,
    pub status: AttendanceStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub marked_at: OffsetDateTime,
}

/// Preloaded counters. `None` means "not loaded", never an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardData {
    pub campus_name: Option<String>,
    pub user_name: Option<String>,
    pub total_users: Option<i64>,
    pub total_events: Option<i64>,
    pub my_attendance: Option<i64>,
    pub pending_reviews: Option<i64>,
    /// Verified share of attendance, as a percentage.
    pub attendance_rate: Option<f64>,
    pub upcoming_events: Option<Vec<UpcomingEvent>>,
    pub recent_attendance: Option<Vec<RecentAttendance>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Stat { key: &'static str, label: &'static str, value: i64 },
    Percent { key: &'static str, label: &'static str, value: f64 },
    Events { key: &'static str, label: &'static str, items: Vec<UpcomingEvent> },
    Activity { key: &'static str, label: &'static str, items: Vec<RecentAttendance> },
}

impl Widget {
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Stat { key, .. } | Self::Percent { key, .. } | Self::Events { key, .. } | Self::Activity { key, .. } => {
                *key
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub role: Role,
    pub campus_name: String,
    pub user_name: String,
    pub widgets: Vec<Widget>,
}

/// Widgets for `role` in display order.
#[must_use]
pub fn compose(role: Role, data: DashboardData) -> Dashboard {
    let stat = |key, label, value: Option<i64>| Widget::Stat { key, label, value: value.unwrap_or(0) };
    let rate = Widget::Percent {
        key: "attendance_rate",
        label: "Attendance rate",
        value: data.attendance_rate.unwrap_or(0.0),
    };
    let upcoming = Widget::Events {
        key: "upcoming_events",
        label: "Upcoming events",
        items: data.upcoming_events.unwrap_or_default(),
    };
    let recent = Widget::Activity {
        key: "recent_attendance",
        label: "Recent attendance",
        items: data.recent_attendance.unwrap_or_default(),
    };

    let widgets = match role {
        Role::Student => vec![stat("my_attendance", "Events attended", data.my_attendance), upcoming],
        Role::Organizer => vec![stat("total_events", "My events", data.total_events), rate, upcoming, recent],
        Role::CampusAdmin | Role::SuperAdmin => vec![
            stat("total_users", "Users", data.total_users),
            stat("total_events", "Events", data.total_events),
            stat("pending_reviews", "Pending reviews", data.pending_reviews),
            rate,
            recent,
        ],
    };

    Dashboard {
        role,
        campus_name: data.campus_name.unwrap_or_default(),
        user_name: data.user_name.unwrap_or_default(),
        widgets,
    }
}

// =============================================================================
// LOADING
// =============================================================================

async fn count(pool: &PgPool, sql: &str, id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(sql).bind(id).fetch_one(pool).await
}

async fn upcoming(pool: &PgPool, campus_id: i64, today: Date) -> Result<Vec<UpcomingEvent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, Date, Time, String)>(
        "SELECT id, title, date, start_time, venue FROM events
         WHERE is_active AND status IN ('published', 'ongoing') AND date >= $2
           AND (campus_id = $1 OR (is_multi_campus AND $1 = ANY(allowed_campuses)))
         ORDER BY date ASC, start_time ASC
         LIMIT $3",
    )
    .bind(campus_id)
    .bind(today)
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, title, date, start_time, venue)| UpcomingEvent { id, title, date, start_time, venue })
        .collect())
}

/// Attendance scope: a whole campus, or the events one organizer runs.
#[derive(Clone, Copy)]
enum Scope {
    Campus(i64),
    Organizer(i64),
}

impl Scope {
    fn filter(self) -> (&'static str, i64) {
        match self {
            Self::Campus(id) => ("a.campus_id = $1", id),
            Self::Organizer(id) => ("e.organizer_id = $1", id),
        }
    }
}

async fn attendance_rate(pool: &PgPool, scope: Scope) -> Result<Option<f64>, sqlx::Error> {
    let (clause, id) = scope.filter();
    let (total, verified) = sqlx::query_as::<_, (i64, i64)>(&format!(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE a.is_verified)
         FROM attendance a JOIN events e ON e.id = a.event_id
         WHERE {clause}"
    ))
    .bind(id)
    .fetch_one(pool)
    .await?;
    if total == 0 {
        return Ok(None);
    }
    #[allow(clippy::cast_precision_loss)]
    let rate = verified as f64 / total as f64 * 100.0;
    Ok(Some(rate))
}

async fn recent(pool: &PgPool, scope: Scope) -> Result<Vec<RecentAttendance>, sqlx::Error> {
    let (clause, id) = scope.filter();
    let rows = sqlx::query(&format!(
        "SELECT concat_ws(' ', u.first_name, NULLIF(u.middle_name, ''), u.last_name) AS full_name,
                e.title, a.status, a.marked_at
         FROM attendance a
         JOIN events e ON e.id = a.event_id
         JOIN users u ON u.id = a.user_id
         WHERE {clause}
         ORDER BY a.marked_at DESC
         LIMIT $2"
    ))
    .bind(id)
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(RecentAttendance {
                full_name: row.try_get("full_name")?,
                event_title: row.try_get("title")?,
                status: decode_text(row, "status")?,
                marked_at: row.try_get("marked_at")?,
            })
        })
        .collect()
}

/// Load the counters `user`'s dashboard shows for `campus_id`.
///
/// # Errors
///
/// Returns a database error if any query fails.
pub async fn load(
    pool: &PgPool,
    user: &UserProfile,
    campus_id: i64,
    offset: UtcOffset,
) -> Result<DashboardData, sqlx::Error> {
    let today = OffsetDateTime::now_utc().to_offset(offset).date();
    let campus_name: Option<String> = sqlx::query_scalar("SELECT name FROM campuses WHERE id = $1")
        .bind(campus_id)
        .fetch_optional(pool)
        .await?;

    let mut data = DashboardData { campus_name, user_name: Some(user.full_name()), ..DashboardData::default() };
    match user.role {
        Role::Student => {
            data.my_attendance =
                Some(count(pool, "SELECT COUNT(*) FROM attendance WHERE user_id = $1", user.id).await?);
            data.upcoming_events = Some(upcoming(pool, campus_id, today).await?);
        }
        Role::Organizer => {
            let scope = Scope::Organizer(user.id);
            data.total_events = Some(
                count(pool, "SELECT COUNT(*) FROM events WHERE organizer_id = $1 AND is_active", user.id).await?,
            );
            data.attendance_rate = attendance_rate(pool, scope).await?;
            data.upcoming_events = Some(upcoming(pool, campus_id, today).await?);
            data.recent_attendance = Some(recent(pool, scope).await?);
        }
        Role::CampusAdmin | Role::SuperAdmin => {
            let scope = Scope::Campus(campus_id);
            data.total_users =
                Some(count(pool, "SELECT COUNT(*) FROM users WHERE campus_id = $1 AND is_active", campus_id).await?);
            data.total_events =
                Some(count(pool, "SELECT COUNT(*) FROM events WHERE campus_id = $1 AND is_active", campus_id).await?);
            data.pending_reviews = Some(
                count(pool, "SELECT COUNT(*) FROM attendance WHERE campus_id = $1 AND NOT is_verified", campus_id)
                    .await?,
            );
            data.attendance_rate = attendance_rate(pool, scope).await?;
            data.recent_attendance = Some(recent(pool, scope).await?);
        }
    }
    Ok(data)
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
