//! Event routes: CRUD scoped to the request campus, plus the QR payload.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Json, Response};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::auth::AuthUser;
use super::campuses::campus_error_to_status;
use super::context::CampusContext;
use crate::services::event::{self, Event, EventError, EventFilter, EventInput, EventPatch};
use crate::state::AppState;

pub(crate) fn event_error_to_status(err: &EventError) -> StatusCode {
    match err {
        EventError::NotFound(_) => StatusCode::NOT_FOUND,
        EventError::Forbidden => StatusCode::FORBIDDEN,
        EventError::Validation(_) => StatusCode::BAD_REQUEST,
        EventError::Campus(e) => campus_error_to_status(e),
        EventError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn event_error(err: EventError) -> Response {
    super::service_error(event_error_to_status(&err), &err)
}

/// Event with the live figures the detail page shows.
#[derive(Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub attendance_count: i64,
    pub capacity_percentage: Option<f64>,
    pub is_ongoing: bool,
    pub can_mark_attendance: bool,
}

#[derive(Debug, Serialize)]
pub struct QrInfo {
    pub event_id: Uuid,
    pub qr_code_data: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub qr_expires_at: Option<OffsetDateTime>,
    pub expired: bool,
}

impl QrInfo {
    pub(crate) fn for_event(event: &Event, now: OffsetDateTime) -> Self {
        Self {
            event_id: event.id,
            qr_code_data: event.qr_code_data.clone(),
            qr_expires_at: event.qr_expires_at,
            expired: event.qr_expired(now),
        }
    }
}

/// `GET /events`: events visible on the request campus.
pub async fn list_events(
    State(state): State<AppState>,
    ctx: CampusContext,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<Event>>, Response> {
    event::list_events(&state.pool, &ctx.auth.user, ctx.campus_id, &filter)
        .await
        .map(Json)
        .map_err(event_error)
}

/// `POST /events`: organizers and admins create on the request campus.
pub async fn create_event(
    State(state): State<AppState>,
    ctx: CampusContext,
    Json(input): Json<EventInput>,
) -> Result<(StatusCode, Json<Event>), Response> {
    let created = event::create_event(
        &state.pool,
        &ctx.auth.user,
        ctx.campus_id,
        &input,
        &state.config.qr_base_url,
        state.config.event_offset,
    )
    .await
    .map_err(event_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /events/{id}`: counts as a view.
pub async fn get_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EventDetail>, Response> {
    let event = event::view_event(&state.pool, &auth.user, id)
        .await
        .map_err(event_error)?;
    let attendance_count = event::attendance_count(&state.pool, id)
        .await
        .map_err(|e| event_error(e.into()))?;

    let now = OffsetDateTime::now_utc();
    Ok(Json(EventDetail {
        attendance_count,
        capacity_percentage: event.capacity_percentage(attendance_count),
        is_ongoing: event.is_ongoing(now, state.config.event_offset),
        can_mark_attendance: event.can_mark_attendance(now),
        event,
    }))
}

/// `PATCH /events/{id}`
pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> Result<Json<Event>, Response> {
    event::update_event(&state.pool, &auth.user, id, &patch)
        .await
        .map(Json)
        .map_err(event_error)
}

/// `DELETE /events/{id}`
pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Response> {
    event::delete_event(&state.pool, &auth.user, id)
        .await
        .map_err(event_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /events/{id}/qr`: the payload the client renders as a QR image.
pub async fn event_qr(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QrInfo>, Response> {
    let event = event::get_event(&state.pool, id).await.map_err(event_error)?;
    if !event::can_view(&auth.user, &event) {
        return Err(event_error(EventError::NotFound(id)));
    }
    Ok(Json(QrInfo::for_event(&event, OffsetDateTime::now_utc())))
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
