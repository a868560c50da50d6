//! Attendance service: marking, validation scoring, review and reports.
//!
//! DESIGN
//! ======
//! Marking runs in one transaction that locks the event row first, so the
//! capacity count, duplicate check and insert see a consistent view. The
//! `(event_id, user_id)` unique key is the final guard against a racing
//! double submit.
//!
//! VALIDATION
//! ==========
//! Each submission is scored by up to three checks (`gps_distance`,
//! `time_window`, `duplicate_check`). A failed check does not reject the
//! submission; it leaves the record unverified for an admin to review.
//! Missing required evidence (selfie, signature, location) is a hard reject.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::{OffsetDateTime, UtcOffset};
use tracing::{info, warn};
use uuid::Uuid;

use super::accounts::UserProfile;
use super::campus::{self, CampusConfiguration};
use super::event::{self, AttendDenial, Event, EventError, EventStatus};
use super::{decode_text, text_enum};
use crate::geo::{self, Coordinate};
use crate::location::{LocationSource, SelectedLocation};

// =============================================================================
// TYPES
// =============================================================================

text_enum! {
    pub enum AttendanceStatus {
        Present => "present",
        Absent => "absent",
        Late => "late",
        Excused => "excused",
    }
}

text_enum! {
    pub enum VerificationMethod {
        QrCode => "qr_code",
        Manual => "manual",
        FacialRecognition => "facial_recognition",
        AdminOverride => "admin_override",
    }
}

text_enum! {
    pub enum ValidationType {
        GpsDistance => "gps_distance",
        TimeWindow => "time_window",
        DuplicateCheck => "duplicate_check",
    }
}

text_enum! {
    pub enum ValidationStatus {
        Passed => "passed",
        Failed => "failed",
        Warning => "warning",
    }
}

text_enum! {
    /// Audit trail entry kinds.
    pub enum LogAction {
        Marked => "marked",
        Updated => "updated",
        Verified => "verified",
        Rejected => "rejected",
        Deleted => "deleted",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("attendance record not found: {0}")]
    NotFound(i64),
    #[error("{0}")]
    Denied(AttendDenial),
    #[error("Event is not open for attendance")]
    NotOpen,
    #[error("{0} is required for this event")]
    MissingEvidence(&'static str),
    #[error("not allowed to review attendance")]
    Forbidden,
    #[error(transparent)]
    Event(#[from] EventError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AttendDenial> for AttendanceError {
    fn from(denial: AttendDenial) -> Self {
        Self::Denied(denial)
    }
}

/// Evidence posted by the attendee.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub location: Option<SelectedLocation>,
    #[serde(default)]
    pub selfie_image: Option<String>,
    #[serde(default)]
    pub signature_image: Option<String>,
}

/// Request facts recorded with the submission.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub validation_type: ValidationType,
    pub status: ValidationStatus,
    /// Always within `0.0..=1.0`.
    pub confidence_score: f64,
    pub details: serde_json::Value,
}

impl ValidationOutcome {
    fn new(validation_type: ValidationType, status: ValidationStatus, confidence: f64, details: serde_json::Value) -> Self {
        Self { validation_type, status, confidence_score: confidence.clamp(0.0, 1.0), details }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub campus_id: i64,
    pub event_id: Uuid,
    pub user_id: i64,
    pub status: AttendanceStatus,
    pub verification_method: VerificationMethod,
    pub cross_campus_attendance: bool,
    pub selfie_image: Option<String>,
    pub signature_image: Option<String>,
    pub location: Option<Coordinate>,
    pub gps_accuracy: Option<f64>,
    pub location_source: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub marked_at: OffsetDateTime,
    pub is_verified: bool,
    pub verification_score: Option<f64>,
    pub verification_notes: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<ValidationOutcome>,
}

/// Attendee identity joined onto a record for event listings and reports.
#[derive(Debug, Clone, Serialize)]
pub struct EventAttendance {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub full_name: String,
    pub email: String,
    pub student_id: Option<String>,
}

// =============================================================================
// VALIDATION
// =============================================================================

fn is_blank(value: Option<&String>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Reject submissions missing evidence the event requires.
///
/// # Errors
///
/// Returns [`AttendanceError::MissingEvidence`] naming the first gap.
pub fn check_evidence(event: &Event, submission: &Submission) -> Result<(), AttendanceError> {
    if event.requires_selfie && is_blank(submission.selfie_image.as_ref()) {
        return Err(AttendanceError::MissingEvidence("Selfie"));
    }
    if event.requires_signature && is_blank(submission.signature_image.as_ref()) {
        return Err(AttendanceError::MissingEvidence("Signature"));
    }
    if event.requires_gps && submission.location.is_none() {
        return Err(AttendanceError::MissingEvidence("Location"));
    }
    Ok(())
}

/// Score the submitted location against the event coordinate.
///
/// Within the campus radius passes, with confidence falling from 1.0 to 0.5
/// at the edge. Out to twice the radius is a warning (0.5 down to 0.0).
/// Beyond that fails. A fallback location always fails; a hand-placed one
/// is capped at a warning since it is not a device reading. Returns `None`
/// when GPS is not checked for this event.
#[must_use]
pub fn validate_gps(
    event: &Event,
    config: &CampusConfiguration,
    location: Option<&SelectedLocation>,
) -> Option<ValidationOutcome> {
    if !event.requires_gps || !config.gps_validation_enabled {
        return None;
    }
    let outcome = |status, confidence, details| {
        Some(ValidationOutcome::new(ValidationType::GpsDistance, status, confidence, details))
    };

    let Some(location) = location else {
        return outcome(ValidationStatus::Failed, 0.0, json!({"reason": "no_location"}));
    };
    if let LocationSource::Fallback { reason } = &location.source {
        let details = json!({"reason": "geolocation_unavailable", "error": reason.to_string()});
        return outcome(ValidationStatus::Failed, 0.0, details);
    }
    let Some(target) = event.location else {
        return outcome(ValidationStatus::Warning, 0.5, json!({"reason": "event_has_no_location"}));
    };

    let radius = f64::from(config.gps_radius_meters.max(1));
    let distance = geo::distance_m(location.coordinate, target);
    let accuracy = location.source.accuracy_m();
    let details = json!({
        "distance_m": distance,
        "radius_m": radius,
        "accuracy_m": accuracy,
        "source": location.source.as_str(),
    });

    let (mut status, confidence) = if distance <= radius {
        (ValidationStatus::Passed, 1.0 - 0.5 * distance / radius)
    } else if distance <= 2.0 * radius {
        (ValidationStatus::Warning, 0.5 * (2.0 * radius - distance) / radius)
    } else {
        (ValidationStatus::Failed, 0.0)
    };

    let device_reading = matches!(location.source, LocationSource::Device { .. });
    let imprecise = accuracy.is_some_and(|a| a > radius);
    if status == ValidationStatus::Passed && (!device_reading || imprecise) {
        status = ValidationStatus::Warning;
    }
    outcome(status, confidence, details)
}

#[must_use]
pub fn validate_time_window(event: &Event, now: OffsetDateTime) -> ValidationOutcome {
    let inside = event.can_mark_attendance(now);
    let (status, confidence) = if inside { (ValidationStatus::Passed, 1.0) } else { (ValidationStatus::Failed, 0.0) };
    ValidationOutcome::new(ValidationType::TimeWindow, status, confidence, json!({"within_window": inside}))
}

#[must_use]
pub fn validate_duplicate(already_marked: bool) -> ValidationOutcome {
    let (status, confidence) =
        if already_marked { (ValidationStatus::Failed, 0.0) } else { (ValidationStatus::Passed, 1.0) };
    ValidationOutcome::new(ValidationType::DuplicateCheck, status, confidence, json!({"existing_record": already_marked}))
}

/// Mean confidence, or `None` when nothing was checked.
#[must_use]
pub fn verification_score(validations: &[ValidationOutcome]) -> Option<f64> {
    if validations.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = validations.len() as f64;
    Some(validations.iter().map(|v| v.confidence_score).sum::<f64>() / n)
}

#[must_use]
pub fn is_verified(validations: &[ValidationOutcome]) -> bool {
    validations.iter().all(|v| v.status != ValidationStatus::Failed)
}

/// `late` once the event has started, `present` before.
#[must_use]
pub fn arrival_status(marked_at: OffsetDateTime, event_start: OffsetDateTime) -> AttendanceStatus {
    if marked_at > event_start { AttendanceStatus::Late } else { AttendanceStatus::Present }
}

/// Every check for one submission, in storage order.
#[must_use]
pub fn run_validations(
    event: &Event,
    config: &CampusConfiguration,
    submission: &Submission,
    already_marked: bool,
    now: OffsetDateTime,
) -> Vec<ValidationOutcome> {
    let mut validations = Vec::with_capacity(3);
    if let Some(gps) = validate_gps(event, config, submission.location.as_ref()) {
        validations.push(gps);
    }
    validations.push(validate_time_window(event, now));
    validations.push(validate_duplicate(already_marked));
    validations
}

// =============================================================================
// MARKING
// =============================================================================

const RECORD_COLUMNS: &str = "a.id, a.campus_id, a.event_id, a.user_id, a.status, a.verification_method, \
     a.cross_campus_attendance, a.selfie_image, a.signature_image, a.latitude, a.longitude, a.gps_accuracy, \
     a.location_source, a.marked_at, a.is_verified, a.verification_score, a.verification_notes";

fn record_from_row(row: &PgRow) -> Result<AttendanceRecord, sqlx::Error> {
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        campus_id: row.try_get("campus_id")?,
        event_id: row.try_get("event_id")?,
        user_id: row.try_get("user_id")?,
        status: decode_text(row, "status")?,
        verification_method: decode_text(row, "verification_method")?,
        cross_campus_attendance: row.try_get("cross_campus_attendance")?,
        selfie_image: row.try_get("selfie_image")?,
        signature_image: row.try_get("signature_image")?,
        location: Coordinate::from_columns(row.try_get("latitude")?, row.try_get("longitude")?),
        gps_accuracy: row.try_get("gps_accuracy")?,
        location_source: row.try_get("location_source")?,
        marked_at: row.try_get("marked_at")?,
        is_verified: row.try_get("is_verified")?,
        verification_score: row.try_get("verification_score")?,
        verification_notes: row.try_get("verification_notes")?,
        validations: Vec::new(),
    })
}

async fn log_action<'e, E>(
    executor: E,
    record: &AttendanceRecord,
    action: LogAction,
    performed_by: i64,
    details: serde_json::Value,
    ip_address: Option<&str>,
) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO attendance_logs (attendance_id, campus_id, action, performed_by, details, ip_address)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(record.id)
    .bind(record.campus_id)
    .bind(action.as_str())
    .bind(performed_by)
    .bind(details)
    .bind(ip_address)
    .execute(executor)
    .await?;
    Ok(())
}

/// Mark `user` present at an event.
///
/// # Errors
///
/// Returns [`AttendanceError::Denied`] when an eligibility check fails,
/// [`AttendanceError::NotOpen`] for draft/closed events,
/// [`AttendanceError::MissingEvidence`] for incomplete submissions, or a
/// database error.
pub async fn mark_attendance(
    pool: &PgPool,
    user: &UserProfile,
    event_id: Uuid,
    submission: &Submission,
    meta: &ClientMeta,
    offset: UtcOffset,
) -> Result<AttendanceRecord, AttendanceError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&format!("SELECT {} FROM events WHERE id = $1 AND is_active FOR UPDATE", event::EVENT_COLUMNS))
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EventError::NotFound(event_id))?;
    let event = event::event_from_row(&row)?;
    if !matches!(event.status, EventStatus::Published | EventStatus::Ongoing) {
        return Err(AttendanceError::NotOpen);
    }

    let now = OffsetDateTime::now_utc();
    let count = event::attendance_count(&mut *tx, event_id).await?;
    let already_marked: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM attendance WHERE event_id = $1 AND user_id = $2)")
            .bind(event_id)
            .bind(user.id)
            .fetch_one(&mut *tx)
            .await?;

    event.can_user_attend(user.campus_id, count, already_marked, now)?;
    check_evidence(&event, submission)?;

    let config = campus::get_configuration(&mut *tx, event.campus_id)
        .await
        .map_err(EventError::from)?;
    let validations = run_validations(&event, &config, submission, already_marked, now);
    let status = arrival_status(now, event.starts_at(offset));
    let location = submission.location.as_ref();

    let row = sqlx::query(
        "INSERT INTO attendance AS a (campus_id, event_id, user_id, status, verification_method,
                                      cross_campus_attendance, selfie_image, signature_image, latitude, longitude,
                                      gps_accuracy, location_source, marked_at, arrival_time, is_verified,
                                      verification_score, ip_address, user_agent, marked_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $3)
         ON CONFLICT (event_id, user_id) DO NOTHING
         RETURNING a.id, a.campus_id, a.event_id, a.user_id, a.status, a.verification_method,
                   a.cross_campus_attendance, a.selfie_image, a.signature_image, a.latitude, a.longitude,
                   a.gps_accuracy, a.location_source, a.marked_at, a.is_verified, a.verification_score,
                   a.verification_notes",
    )
    .bind(event.campus_id)
    .bind(event_id)
    .bind(user.id)
    .bind(status.as_str())
    .bind(VerificationMethod::QrCode.as_str())
    .bind(user.campus_id != event.campus_id)
    .bind(submission.selfie_image.as_deref())
    .bind(submission.signature_image.as_deref())
    .bind(location.map(|l| l.coordinate.lat()))
    .bind(location.map(|l| l.coordinate.lng()))
    .bind(location.and_then(|l| l.source.accuracy_m()))
    .bind(location.map(|l| l.source.as_str()))
    .bind(now)
    .bind(now.to_offset(offset).time())
    .bind(is_verified(&validations))
    .bind(verification_score(&validations))
    .bind(meta.ip_address.as_deref())
    .bind(&meta.user_agent)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AttendanceError::Denied(AttendDenial::AlreadyMarked))?;
    let mut record = record_from_row(&row)?;

    for validation in &validations {
        sqlx::query(
            "INSERT INTO attendance_validations (attendance_id, validation_type, status, confidence_score, details)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(validation.validation_type.as_str())
        .bind(validation.status.as_str())
        .bind(validation.confidence_score)
        .bind(&validation.details)
        .execute(&mut *tx)
        .await?;
    }

    let details = json!({
        "status": record.status,
        "verification_score": record.verification_score,
        "cross_campus": record.cross_campus_attendance,
    });
    log_action(&mut *tx, &record, LogAction::Marked, user.id, details, meta.ip_address.as_deref()).await?;

    sqlx::query("UPDATE users SET last_attendance = $2, updated_at = now() WHERE id = $1")
        .bind(user.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if !record.is_verified {
        warn!(attendance_id = record.id, %event_id, user_id = user.id, "attendance recorded unverified");
    }
    info!(attendance_id = record.id, %event_id, user_id = user.id, status = %record.status, "attendance marked");
    record.validations = validations;
    Ok(record)
}

// =============================================================================
// REVIEW
// =============================================================================

async fn get_record(pool: &PgPool, attendance_id: i64) -> Result<AttendanceRecord, AttendanceError> {
    let row = sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM attendance a WHERE a.id = $1"))
        .bind(attendance_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AttendanceError::NotFound(attendance_id))?;
    Ok(record_from_row(&row)?)
}

/// Admin decision on a record: verify (`true`) or reject (`false`).
///
/// # Errors
///
/// Returns [`AttendanceError::Forbidden`] unless the reviewer is an admin of
/// the record's campus.
pub async fn review_attendance(
    pool: &PgPool,
    reviewer: &UserProfile,
    attendance_id: i64,
    verified: bool,
    notes: &str,
    ip_address: Option<&str>,
) -> Result<AttendanceRecord, AttendanceError> {
    if !reviewer.role.is_admin() {
        return Err(AttendanceError::Forbidden);
    }
    let mut record = get_record(pool, attendance_id).await?;
    if !campus::can_access_campus(reviewer, record.campus_id) {
        return Err(AttendanceError::Forbidden);
    }

    let notes = notes.trim();
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE attendance SET is_verified = $2, verification_notes = $3, updated_at = now() WHERE id = $1")
        .bind(attendance_id)
        .bind(verified)
        .bind(notes)
        .execute(&mut *tx)
        .await?;
    record.is_verified = verified;
    record.verification_notes = notes.to_owned();

    let action = if verified { LogAction::Verified } else { LogAction::Rejected };
    log_action(&mut *tx, &record, action, reviewer.id, json!({"notes": notes}), ip_address).await?;
    tx.commit().await?;

    info!(attendance_id, reviewer_id = reviewer.id, action = %action, "attendance reviewed");
    Ok(record)
}

// =============================================================================
// LISTINGS
// =============================================================================

/// Every record for an event, with attendee identity, in marking order.
///
/// # Errors
///
/// Returns [`EventError::Forbidden`] (wrapped) unless the user manages the
/// event.
pub async fn list_for_event(
    pool: &PgPool,
    user: &UserProfile,
    event_id: Uuid,
) -> Result<Vec<EventAttendance>, AttendanceError> {
    let event = event::get_event(pool, event_id).await?;
    if !event::can_manage(user, &event) {
        return Err(EventError::Forbidden.into());
    }

    let rows = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS}, u.first_name, u.middle_name, u.last_name, u.email, u.student_id
         FROM attendance a
         JOIN users u ON u.id = a.user_id
         WHERE a.event_id = $1
         ORDER BY a.marked_at ASC, a.id ASC"
    ))
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let parts: [String; 3] = [row.try_get("first_name")?, row.try_get("middle_name")?, row.try_get("last_name")?];
            Ok(EventAttendance {
                record: record_from_row(row)?,
                full_name: join_name(&parts),
                email: row.try_get("email")?,
                student_id: row.try_get("student_id")?,
            })
        })
        .collect::<Result<_, sqlx::Error>>()
        .map_err(AttendanceError::from)
}

fn join_name(parts: &[String]) -> String {
    parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ")
}

/// The caller's own attendance history, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<AttendanceRecord>, AttendanceError> {
    let rows = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM attendance a WHERE a.user_id = $1 ORDER BY a.marked_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(record_from_row).collect::<Result<_, _>>()?)
}

// =============================================================================
// REPORTS
// =============================================================================

const CSV_HEADER: [&str; 9] = [
    "Name",
    "Email",
    "Student ID",
    "Status",
    "Marked At",
    "Verified",
    "Score",
    "Cross Campus",
    "Location Source",
];

/// Quote a field when it contains a delimiter, quote or line break, and
/// neutralize leading spreadsheet formula characters.
#[must_use]
pub fn csv_field(value: &str) -> String {
    let value = if value.starts_with(['=', '+', '-', '@']) { format!("'{value}") } else { value.to_owned() };
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

/// Render an event's attendance as CSV (CRLF line endings, header first).
#[must_use]
pub fn render_csv(entries: &[EventAttendance]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push_str("\r\n");
    for entry in entries {
        let record = &entry.record;
        let marked_at = record
            .marked_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let fields = [
            entry.full_name.clone(),
            entry.email.clone(),
            entry.student_id.clone().unwrap_or_default(),
            record.status.to_string(),
            marked_at,
            if record.is_verified { "yes" } else { "no" }.to_owned(),
            record.verification_score.map(|s| format!("{s:.2}")).unwrap_or_default(),
            if record.cross_campus_attendance { "yes" } else { "no" }.to_owned(),
            record.location_source.clone().unwrap_or_default(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
#[path = "attendance_test.rs"]
mod tests;
