//! Dashboard route.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use super::context::{CAMPUS_ID_HEADER, CampusContext};
use crate::services::dashboard;
use crate::state::AppState;

/// `GET /dashboard`: role widgets for the request campus.
pub async fn dashboard(State(state): State<AppState>, ctx: CampusContext) -> Result<Response, Response> {
    let data = dashboard::load(&state.pool, &ctx.auth.user, ctx.campus_id, state.config.event_offset)
        .await
        .map_err(|e| super::service_error(StatusCode::INTERNAL_SERVER_ERROR, &e))?;
    let body = dashboard::compose(ctx.auth.user.role, data);
    Ok(([(CAMPUS_ID_HEADER, ctx.campus_id.to_string())], Json(body)).into_response())
}
