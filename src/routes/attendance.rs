//! Attendance routes: submission, listings, review, and the CSV report.

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::events::event_error_to_status;
use crate::services::attendance::{self, AttendanceError, AttendanceRecord, ClientMeta, EventAttendance, Submission};
use crate::services::event::AttendDenial;
use crate::state::AppState;

pub(crate) fn attendance_error_to_status(err: &AttendanceError) -> StatusCode {
    match err {
        AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
        AttendanceError::Denied(AttendDenial::CampusNotAllowed) | AttendanceError::Forbidden => {
            StatusCode::FORBIDDEN
        }
        AttendanceError::Denied(_) | AttendanceError::NotOpen => StatusCode::CONFLICT,
        AttendanceError::MissingEvidence(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AttendanceError::Event(e) => event_error_to_status(e),
        AttendanceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn attendance_error(err: AttendanceError) -> Response {
    super::service_error(attendance_error_to_status(&err), &err)
}

/// Throttle key: one submission per user and event per window.
pub(crate) fn submit_key(user_id: i64, event_id: Uuid) -> String {
    format!("{user_id}:{event_id}")
}

/// `POST /events/{id}/attendance`
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: ClientMeta,
    Path(event_id): Path<Uuid>,
    Json(submission): Json<Submission>,
) -> Result<(StatusCode, Json<AttendanceRecord>), Response> {
    let key = submit_key(auth.user.id, event_id);
    if let Err(e) = state.submit_limiter.check_and_record(&key) {
        tracing::warn!(user_id = auth.user.id, %event_id, error = %e, "attendance submission throttled");
        return Err(super::error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Attendance is already being submitted. Please wait.",
        ));
    }

    let record = attendance::mark_attendance(
        &state.pool,
        &auth.user,
        event_id,
        &submission,
        &meta,
        state.config.event_offset,
    )
    .await
    .map_err(|e| {
        // Only accepted submissions hold the slot; a rejected one may be retried at once.
        state.submit_limiter.reset(&key);
        attendance_error(e)
    })?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /events/{id}/attendance`: organizers of the event and admins.
pub async fn list_for_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<EventAttendance>>, Response> {
    attendance::list_for_event(&state.pool, &auth.user, event_id)
        .await
        .map(Json)
        .map_err(attendance_error)
}

/// `GET /events/{id}/attendance/export.csv`
pub async fn export_csv(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, Response> {
    let entries = attendance::list_for_event(&state.pool, &auth.user, event_id)
        .await
        .map_err(attendance_error)?;
    let disposition = format!("attachment; filename=\"attendance-{event_id}.csv\"");
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()), (header::CONTENT_DISPOSITION, disposition)],
        attendance::render_csv(&entries),
    )
        .into_response())
}

/// `GET /attendance/mine`
pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<AttendanceRecord>>, Response> {
    attendance::list_for_user(&state.pool, auth.user.id)
        .await
        .map(Json)
        .map_err(attendance_error)
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewBody {
    #[serde(default)]
    pub notes: String,
}

async fn review(state: &AppState, auth: &AuthUser, meta: &ClientMeta, id: i64, verified: bool, notes: &str) -> Response {
    let ip_address = meta.ip_address.as_deref();
    match attendance::review_attendance(&state.pool, &auth.user, id, verified, notes, ip_address).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => attendance_error(e),
    }
}

/// `POST /attendance/{id}/verify`
pub async fn verify(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: ClientMeta,
    Path(id): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Response {
    review(&state, &auth, &meta, id, true, &body.notes).await
}

/// `POST /attendance/{id}/reject`
pub async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    meta: ClientMeta,
    Path(id): Path<i64>,
    Json(body): Json<ReviewBody>,
) -> Response {
    review(&state, &auth, &meta, id, false, &body.notes).await
}

#[cfg(test)]
#[path = "attendance_test.rs"]
mod tests;
