//! Campus routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use super::auth::AuthUser;
use super::context::{CampusContext, campus_headers};
use crate::services::campus::{self, Campus, CampusConfiguration, CampusError, CampusStatistics, CampusSummary};
use crate::state::AppState;

pub(crate) fn campus_error_to_status(err: &CampusError) -> StatusCode {
    match err {
        CampusError::NotFound(_) => StatusCode::NOT_FOUND,
        CampusError::Forbidden(_) => StatusCode::FORBIDDEN,
        CampusError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn campus_error(err: CampusError) -> Response {
    super::service_error(campus_error_to_status(&err), &err)
}

#[derive(Serialize)]
pub struct AccessibleCampuses {
    pub current: Option<CampusSummary>,
    pub accessible: Vec<CampusSummary>,
}

#[derive(Serialize)]
pub struct CampusDetail {
    pub campus: Campus,
    pub configuration: CampusConfiguration,
}

/// `GET /campuses`: every campus the caller may see.
pub async fn list_campuses(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<Campus>>, Response> {
    let access = campus::campus_access(&auth.user);
    campus::list_campuses(&state.pool, &access)
        .await
        .map(Json)
        .map_err(campus_error)
}

/// `GET /campuses/accessible`: the switcher list plus the request's campus.
pub async fn accessible_campuses(State(state): State<AppState>, ctx: CampusContext) -> Result<Response, Response> {
    let access = campus::campus_access(&ctx.auth.user);
    let campuses = campus::list_campuses(&state.pool, &access)
        .await
        .map_err(campus_error)?;

    let current = campuses
        .iter()
        .find(|c| c.id == ctx.campus_id)
        .map(CampusSummary::from);
    let headers = current.as_ref().map(|c| campus_headers(c.id, &c.code));
    let body = AccessibleCampuses { current, accessible: campuses.iter().map(CampusSummary::from).collect() };

    Ok(match headers {
        Some(headers) => (headers, Json(body)).into_response(),
        None => Json(body).into_response(),
    })
}

/// `GET /campuses/{id}`: campus with its settings.
pub async fn get_campus(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, Response> {
    let campus = campus::get_accessible_campus(&state.pool, &auth.user, id)
        .await
        .map_err(campus_error)?;
    let configuration = campus::get_configuration(&state.pool, id)
        .await
        .map_err(campus_error)?;

    let headers = campus_headers(campus.id, &campus.code);
    Ok((headers, Json(CampusDetail { campus, configuration })).into_response())
}

/// `GET /campuses/{id}/statistics`: admins only.
pub async fn campus_statistics(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<CampusStatistics>, Response> {
    if !auth.user.role.is_admin() || !campus::can_access_campus(&auth.user, id) {
        return Err(campus_error(CampusError::Forbidden(id)));
    }
    campus::campus_statistics(&state.pool, id)
        .await
        .map(Json)
        .map_err(campus_error)
}

#[cfg(test)]
#[path = "campuses_test.rs"]
mod tests;
