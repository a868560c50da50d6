//! Event service: scheduling rules, QR payloads, eligibility and CRUD.
//!
//! DESIGN
//! ======
//! Event dates and clock times are stored without an offset; they are read
//! in the deployment's configured offset (`EVENT_UTC_OFFSET_HOURS`). The
//! attendance window, QR expiry and audit timestamps are absolute instants.
//!
//! Eligibility ([`Event::can_user_attend`]) is a pure function over counts
//! the caller loads, so the attendance service can evaluate it inside the
//! same transaction that inserts the record.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::info;
use uuid::Uuid;

use super::accounts::UserProfile;
use super::campus::{self, CampusConfiguration, CampusError};
use super::{decode_text, text_enum};
use crate::geo::Coordinate;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_VENUE_LEN: usize = 200;

time::serde::format_description!(pub(crate) clock_time, Time, "[hour]:[minute]");

text_enum! {
    pub enum EventStatus {
        Draft => "draft",
        Published => "published",
        Ongoing => "ongoing",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum EventType {
        Academic => "academic",
        Seminar => "seminar",
        Workshop => "workshop",
        Conference => "conference",
        Social => "social",
        Sports => "sports",
        Cultural => "cultural",
        Other => "other",
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl Default for EventType {
    fn default() -> Self {
        Self::Academic
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event not found: {0}")]
    NotFound(Uuid),
    #[error("not allowed to manage this event")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Campus(#[from] CampusError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Reason an attendance submission is refused, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttendDenial {
    #[error("Event not available for your campus")]
    CampusNotAllowed,
    #[error("Event is at capacity")]
    AtCapacity,
    #[error("Already marked attendance for this event")]
    AlreadyMarked,
    #[error("Attendance window is closed")]
    WindowClosed,
}

// =============================================================================
// EVENT
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub campus_id: i64,
    pub organizer_id: i64,
    pub title: String,
    pub description: String,
    pub event_type: EventType,
    pub date: Date,
    #[serde(with = "clock_time")]
    pub start_time: Time,
    #[serde(with = "clock_time")]
    pub end_time: Time,
    pub venue: String,
    pub location: Option<Coordinate>,
    pub is_multi_campus: bool,
    pub allowed_campuses: Vec<i64>,
    pub max_participants: Option<i32>,
    pub requires_registration: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub registration_deadline: Option<OffsetDateTime>,
    pub qr_code_data: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub qr_expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub attendance_window_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub attendance_window_end: Option<OffsetDateTime>,
    pub status: EventStatus,
    pub is_active: bool,
    pub requires_selfie: bool,
    pub requires_gps: bool,
    pub requires_signature: bool,
    pub view_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Combine a calendar date and clock time in the given offset.
#[must_use]
pub fn at_offset(date: Date, time: Time, offset: UtcOffset) -> OffsetDateTime {
    PrimitiveDateTime::new(date, time).assume_offset(offset)
}

/// Window of `minutes` either side of the event start.
#[must_use]
pub fn default_window(start: OffsetDateTime, minutes: i32) -> (OffsetDateTime, OffsetDateTime) {
    let margin = Duration::minutes(i64::from(minutes));
    (start - margin, start + margin)
}

/// Text encoded in the event's QR code.
#[must_use]
pub fn qr_payload(base_url: &str, event_id: Uuid) -> String {
    format!("{}/attend/{event_id}", base_url.trim_end_matches('/'))
}

#[must_use]
pub fn qr_expires_at(created_at: OffsetDateTime, expiry_hours: i32) -> OffsetDateTime {
    created_at + Duration::hours(i64::from(expiry_hours))
}

impl Event {
    #[must_use]
    pub fn starts_at(&self, offset: UtcOffset) -> OffsetDateTime {
        at_offset(self.date, self.start_time, offset)
    }

    #[must_use]
    pub fn ends_at(&self, offset: UtcOffset) -> OffsetDateTime {
        at_offset(self.date, self.end_time, offset)
    }

    #[must_use]
    pub fn is_ongoing(&self, now: OffsetDateTime, offset: UtcOffset) -> bool {
        self.starts_at(offset) <= now && now <= self.ends_at(offset)
    }

    /// True inside the attendance window. Events without a window never accept.
    #[must_use]
    pub fn can_mark_attendance(&self, now: OffsetDateTime) -> bool {
        match (self.attendance_window_start, self.attendance_window_end) {
            (Some(start), Some(end)) => start <= now && now <= end,
            _ => false,
        }
    }

    /// Share of capacity used, or `None` when the event is uncapped.
    #[must_use]
    pub fn capacity_percentage(&self, attendance_count: i64) -> Option<f64> {
        let max = self.max_participants.filter(|m| *m > 0)?;
        #[allow(clippy::cast_precision_loss)]
        let count = attendance_count as f64;
        Some(count / f64::from(max) * 100.0)
    }

    /// The host campus always qualifies; multi-campus events add their list.
    #[must_use]
    pub fn allows_campus(&self, campus_id: i64) -> bool {
        campus_id == self.campus_id || (self.is_multi_campus && self.allowed_campuses.contains(&campus_id))
    }

    /// # Errors
    ///
    /// Returns the first failing check: campus, capacity, duplicate, window.
    pub fn can_user_attend(
        &self,
        user_campus_id: i64,
        attendance_count: i64,
        already_marked: bool,
        now: OffsetDateTime,
    ) -> Result<(), AttendDenial> {
        if !self.allows_campus(user_campus_id) {
            return Err(AttendDenial::CampusNotAllowed);
        }
        if let Some(max) = self.max_participants {
            if attendance_count >= i64::from(max) {
                return Err(AttendDenial::AtCapacity);
            }
        }
        if already_marked {
            return Err(AttendDenial::AlreadyMarked);
        }
        if !self.can_mark_attendance(now) {
            return Err(AttendDenial::WindowClosed);
        }
        Ok(())
    }

    #[must_use]
    pub fn qr_expired(&self, now: OffsetDateTime) -> bool {
        self.qr_expires_at.is_some_and(|at| now > at)
    }
}

// =============================================================================
// INPUT
// =============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub event_type: EventType,
    pub date: Date,
    #[serde(with = "clock_time")]
    pub start_time: Time,
    #[serde(with = "clock_time")]
    pub end_time: Time,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub is_multi_campus: bool,
    #[serde(default)]
    pub allowed_campuses: Vec<i64>,
    #[serde(default)]
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub requires_registration: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub registration_deadline: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub attendance_window_start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub attendance_window_end: Option<OffsetDateTime>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default = "default_true")]
    pub requires_selfie: bool,
    #[serde(default = "default_true")]
    pub requires_gps: bool,
    #[serde(default = "default_true")]
    pub requires_signature: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<EventType>,
    pub date: Option<Date>,
    #[serde(default, with = "clock_time::option")]
    pub start_time: Option<Time>,
    #[serde(default, with = "clock_time::option")]
    pub end_time: Option<Time>,
    pub venue: Option<String>,
    pub location: Option<Coordinate>,
    pub max_participants: Option<i32>,
    pub status: Option<EventStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub attendance_window_start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub attendance_window_end: Option<OffsetDateTime>,
    pub requires_selfie: Option<bool>,
    pub requires_gps: Option<bool>,
    pub requires_signature: Option<bool>,
}

fn validation(message: impl Into<String>) -> EventError {
    EventError::Validation(message.into())
}

/// Field rules shared by create and update.
fn check_fields(
    title: &str,
    venue: &str,
    start: Time,
    end: Time,
    max_participants: Option<i32>,
    window: (Option<OffsetDateTime>, Option<OffsetDateTime>),
) -> Result<(), EventError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(validation("Title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(validation(format!("Title must be at most {MAX_TITLE_LEN} characters")));
    }
    if venue.chars().count() > MAX_VENUE_LEN {
        return Err(validation(format!("Venue must be at most {MAX_VENUE_LEN} characters")));
    }
    if end <= start {
        return Err(validation("End time must be after start time"));
    }
    if max_participants.is_some_and(|m| m <= 0) {
        return Err(validation("Max participants must be positive"));
    }
    if let (Some(start), Some(end)) = window {
        if end <= start {
            return Err(validation("Attendance window must end after it starts"));
        }
    }
    Ok(())
}

impl EventInput {
    /// # Errors
    ///
    /// Returns [`EventError::Validation`] describing the first bad field.
    pub fn validate(&self) -> Result<(), EventError> {
        check_fields(
            &self.title,
            &self.venue,
            self.start_time,
            self.end_time,
            self.max_participants,
            (self.attendance_window_start, self.attendance_window_end),
        )
    }
}

impl EventPatch {
    /// Apply onto a copy of `event` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Validation`] if the patched event is invalid.
    pub fn apply(&self, event: &Event) -> Result<Event, EventError> {
        let mut next = event.clone();
        if let Some(title) = &self.title {
            next.title = title.trim().to_owned();
        }
        if let Some(description) = &self.description {
            next.description.clone_from(description);
        }
        if let Some(venue) = &self.venue {
            next.venue = venue.trim().to_owned();
        }
        next.event_type = self.event_type.unwrap_or(next.event_type);
        next.date = self.date.unwrap_or(next.date);
        next.start_time = self.start_time.unwrap_or(next.start_time);
        next.end_time = self.end_time.unwrap_or(next.end_time);
        next.location = self.location.or(next.location);
        next.max_participants = self.max_participants.or(next.max_participants);
        next.status = self.status.unwrap_or(next.status);
        next.attendance_window_start = self.attendance_window_start.or(next.attendance_window_start);
        next.attendance_window_end = self.attendance_window_end.or(next.attendance_window_end);
        next.requires_selfie = self.requires_selfie.unwrap_or(next.requires_selfie);
        next.requires_gps = self.requires_gps.unwrap_or(next.requires_gps);
        next.requires_signature = self.requires_signature.unwrap_or(next.requires_signature);

        check_fields(
            &next.title,
            &next.venue,
            next.start_time,
            next.end_time,
            next.max_participants,
            (next.attendance_window_start, next.attendance_window_end),
        )?;
        Ok(next)
    }
}

/// Build a new event from validated input. Missing window bounds default to
/// the campus window around the start; the QR payload embeds the new id.
///
/// # Errors
///
/// Returns [`EventError::Validation`] for bad input, or when a multi-campus
/// event is requested on a campus that has them disabled.
pub fn build_event(
    input: &EventInput,
    organizer: &UserProfile,
    campus_id: i64,
    config: &CampusConfiguration,
    qr_base_url: &str,
    offset: UtcOffset,
    now: OffsetDateTime,
) -> Result<Event, EventError> {
    input.validate()?;
    if input.is_multi_campus && !config.multi_campus_events_enabled {
        return Err(validation("Multi-campus events are disabled for this campus"));
    }

    let id = Uuid::new_v4();
    let (default_start, default_end) =
        default_window(at_offset(input.date, input.start_time, offset), config.attendance_window_minutes);

    Ok(Event {
        id,
        campus_id,
        organizer_id: organizer.id,
        title: input.title.trim().to_owned(),
        description: input.description.clone(),
        event_type: input.event_type,
        date: input.date,
        start_time: input.start_time,
        end_time: input.end_time,
        venue: input.venue.trim().to_owned(),
        location: input.location,
        is_multi_campus: input.is_multi_campus,
        allowed_campuses: if input.is_multi_campus { input.allowed_campuses.clone() } else { Vec::new() },
        max_participants: input.max_participants,
        requires_registration: input.requires_registration,
        registration_deadline: input.registration_deadline,
        qr_code_data: qr_payload(qr_base_url, id),
        qr_expires_at: Some(qr_expires_at(now, config.qr_code_expiry_hours)),
        attendance_window_start: Some(input.attendance_window_start.unwrap_or(default_start)),
        attendance_window_end: Some(input.attendance_window_end.unwrap_or(default_end)),
        status: input.status,
        is_active: true,
        requires_selfie: input.requires_selfie,
        requires_gps: input.requires_gps,
        requires_signature: input.requires_signature,
        view_count: 0,
        created_at: now,
    })
}

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Organizers manage their own events; admins manage any event on a campus
/// they can access.
#[must_use]
pub fn can_manage(user: &UserProfile, event: &Event) -> bool {
    if !user.role.can_manage_events() || !campus::can_access_campus(user, event.campus_id) {
        return false;
    }
    user.role.is_admin() || event.organizer_id == user.id
}

/// Whether a user may see an event at all: managers see drafts on their
/// campuses, everyone else sees non-draft events their campus is allowed into.
#[must_use]
pub fn can_view(user: &UserProfile, event: &Event) -> bool {
    if can_manage(user, event) {
        return true;
    }
    event.status != EventStatus::Draft && event.allows_campus(user.campus_id)
}

// =============================================================================
// QUERIES
// =============================================================================

pub(crate) const EVENT_COLUMNS: &str = "id, campus_id, organizer_id, title, description, event_type, date, start_time, \
     end_time, venue, latitude, longitude, is_multi_campus, allowed_campuses, max_participants, \
     requires_registration, registration_deadline, qr_code_data, qr_expires_at, attendance_window_start, \
     attendance_window_end, status, is_active, requires_selfie, requires_gps, requires_signature, \
     view_count, created_at";

pub(crate) fn event_from_row(row: &PgRow) -> Result<Event, sqlx::Error> {
    Ok(Event {
        id: row.try_get("id")?,
        campus_id: row.try_get("campus_id")?,
        organizer_id: row.try_get("organizer_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        event_type: decode_text(row, "event_type")?,
        date: row.try_get("date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        venue: row.try_get("venue")?,
        location: Coordinate::from_columns(row.try_get("latitude")?, row.try_get("longitude")?),
        is_multi_campus: row.try_get("is_multi_campus")?,
        allowed_campuses: row.try_get("allowed_campuses")?,
        max_participants: row.try_get("max_participants")?,
        requires_registration: row.try_get("requires_registration")?,
        registration_deadline: row.try_get("registration_deadline")?,
        qr_code_data: row.try_get("qr_code_data")?,
        qr_expires_at: row.try_get("qr_expires_at")?,
        attendance_window_start: row.try_get("attendance_window_start")?,
        attendance_window_end: row.try_get("attendance_window_end")?,
        status: decode_text(row, "status")?,
        is_active: row.try_get("is_active")?,
        requires_selfie: row.try_get("requires_selfie")?,
        requires_gps: row.try_get("requires_gps")?,
        requires_signature: row.try_get("requires_signature")?,
        view_count: row.try_get("view_count")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Create an event on the caller's resolved campus.
///
/// # Errors
///
/// Returns [`EventError::Forbidden`] for students, a validation error for bad
/// input, or a database error.
pub async fn create_event(
    pool: &PgPool,
    organizer: &UserProfile,
    campus_id: i64,
    input: &EventInput,
    qr_base_url: &str,
    offset: UtcOffset,
) -> Result<Event, EventError> {
    if !organizer.role.can_manage_events() || !campus::can_access_campus(organizer, campus_id) {
        return Err(EventError::Forbidden);
    }
    let config = campus::get_configuration(pool, campus_id).await?;
    let event = build_event(input, organizer, campus_id, &config, qr_base_url, offset, OffsetDateTime::now_utc())?;

    sqlx::query(
        "INSERT INTO events (id, campus_id, organizer_id, title, description, event_type, date, start_time,
                             end_time, venue, latitude, longitude, is_multi_campus, allowed_campuses,
                             max_participants, requires_registration, registration_deadline, qr_code_data,
                             qr_expires_at, attendance_window_start, attendance_window_end, status,
                             requires_selfie, requires_gps, requires_signature, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
                 $21, $22, $23, $24, $25, $26)",
    )
    .bind(event.id)
    .bind(event.campus_id)
    .bind(event.organizer_id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.event_type.as_str())
    .bind(event.date)
    .bind(event.start_time)
    .bind(event.end_time)
    .bind(&event.venue)
    .bind(event.location.map(|c| c.lat()))
    .bind(event.location.map(|c| c.lng()))
    .bind(event.is_multi_campus)
    .bind(&event.allowed_campuses)
    .bind(event.max_participants)
    .bind(event.requires_registration)
    .bind(event.registration_deadline)
    .bind(&event.qr_code_data)
    .bind(event.qr_expires_at)
    .bind(event.attendance_window_start)
    .bind(event.attendance_window_end)
    .bind(event.status.as_str())
    .bind(event.requires_selfie)
    .bind(event.requires_gps)
    .bind(event.requires_signature)
    .bind(event.created_at)
    .execute(pool)
    .await?;

    info!(event_id = %event.id, campus_id, organizer_id = organizer.id, "event created");
    Ok(event)
}

/// Fetch an active event by id.
///
/// # Errors
///
/// Returns [`EventError::NotFound`] if missing or soft-deleted.
pub async fn get_event(pool: &PgPool, event_id: Uuid) -> Result<Event, EventError> {
    let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 AND is_active"))
        .bind(event_id)
        .fetch_optional(pool)
        .await?
        .ok_or(EventError::NotFound(event_id))?;
    Ok(event_from_row(&row)?)
}

/// Fetch an event the user is allowed to see, counting the view.
///
/// # Errors
///
/// Invisible events report [`EventError::NotFound`] so their existence is
/// not leaked.
pub async fn view_event(pool: &PgPool, user: &UserProfile, event_id: Uuid) -> Result<Event, EventError> {
    let mut event = get_event(pool, event_id).await?;
    if !can_view(user, &event) {
        return Err(EventError::NotFound(event_id));
    }
    sqlx::query("UPDATE events SET view_count = view_count + 1 WHERE id = $1")
        .bind(event_id)
        .execute(pool)
        .await?;
    event.view_count += 1;
    Ok(event)
}

/// Listing filters. All fields are optional and combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub event_type: Option<EventType>,
    pub from: Option<Date>,
    pub to: Option<Date>,
    /// Only events organized by the caller.
    #[serde(default)]
    pub mine: bool,
}

/// Events visible on `campus_id`: hosted there, or multi-campus events that
/// admit it. Non-managers never see drafts.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_events(
    pool: &PgPool,
    user: &UserProfile,
    campus_id: i64,
    filter: &EventFilter,
) -> Result<Vec<Event>, EventError> {
    let mut builder = QueryBuilder::<sqlx::Postgres>::new(format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE is_active AND (campus_id = "
    ));
    builder.push_bind(campus_id);
    builder.push(" OR (is_multi_campus AND ");
    builder.push_bind(campus_id);
    builder.push(" = ANY(allowed_campuses)))");

    if !user.role.can_manage_events() {
        builder.push(" AND status <> 'draft'");
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(event_type) = filter.event_type {
        builder.push(" AND event_type = ").push_bind(event_type.as_str());
    }
    if let Some(from) = filter.from {
        builder.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND date <= ").push_bind(to);
    }
    if filter.mine {
        builder.push(" AND organizer_id = ").push_bind(user.id);
    }
    builder.push(" ORDER BY date ASC, start_time ASC");

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows.iter().map(event_from_row).collect::<Result<_, _>>()?)
}

/// # Errors
///
/// Returns [`EventError::Forbidden`] unless [`can_manage`] holds, or a
/// validation error from the patch.
pub async fn update_event(
    pool: &PgPool,
    user: &UserProfile,
    event_id: Uuid,
    patch: &EventPatch,
) -> Result<Event, EventError> {
    let current = get_event(pool, event_id).await?;
    if !can_manage(user, &current) {
        return Err(EventError::Forbidden);
    }
    let next = patch.apply(&current)?;

    sqlx::query(
        "UPDATE events
         SET title = $2, description = $3, event_type = $4, date = $5, start_time = $6, end_time = $7,
             venue = $8, latitude = $9, longitude = $10, max_participants = $11, status = $12,
             attendance_window_start = $13, attendance_window_end = $14, requires_selfie = $15,
             requires_gps = $16, requires_signature = $17, updated_at = now()
         WHERE id = $1",
    )
    .bind(next.id)
    .bind(&next.title)
    .bind(&next.description)
    .bind(next.event_type.as_str())
    .bind(next.date)
    .bind(next.start_time)
    .bind(next.end_time)
    .bind(&next.venue)
    .bind(next.location.map(|c| c.lat()))
    .bind(next.location.map(|c| c.lng()))
    .bind(next.max_participants)
    .bind(next.status.as_str())
    .bind(next.attendance_window_start)
    .bind(next.attendance_window_end)
    .bind(next.requires_selfie)
    .bind(next.requires_gps)
    .bind(next.requires_signature)
    .execute(pool)
    .await?;

    info!(%event_id, user_id = user.id, "event updated");
    Ok(next)
}

/// Soft-delete: the row stays for attendance history but disappears from
/// every read path.
///
/// # Errors
///
/// Returns [`EventError::Forbidden`] unless [`can_manage`] holds.
pub async fn delete_event(pool: &PgPool, user: &UserProfile, event_id: Uuid) -> Result<(), EventError> {
    let current = get_event(pool, event_id).await?;
    if !can_manage(user, &current) {
        return Err(EventError::Forbidden);
    }
    sqlx::query("UPDATE events SET is_active = FALSE, updated_at = now() WHERE id = $1")
        .bind(event_id)
        .execute(pool)
        .await?;
    info!(%event_id, user_id = user.id, "event deleted");
    Ok(())
}

/// Records that count toward capacity (`present` and `late`).
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn attendance_count<'e, E>(executor: E, event_id: Uuid) -> Result<i64, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE event_id = $1 AND status IN ('present', 'late')")
        .bind(event_id)
        .fetch_one(executor)
        .await
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
