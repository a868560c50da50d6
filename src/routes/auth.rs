//! Auth routes: login, logout, registration, profile, and the user listing.
//!
//! Every handler here answers with the `{success, data | message}` envelope
//! produced by the active [`AuthBackend`](crate::services::auth::AuthBackend);
//! the HTTP status is derived from the failure message.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use time::Duration;

use crate::config::AppConfig;
use crate::services::accounts::UserProfile;
use crate::services::attendance::ClientMeta;
use crate::services::auth::{
    Credentials, EMAIL_TAKEN, INVALID_CREDENTIALS, NOT_AUTHENTICATED, PasswordChange, ProfileUpdate, Registration,
    ServiceResponse, TokenStatus, UNEXPECTED_ERROR, USER_NOT_FOUND,
};
use crate::services::campus::can_access_campus;
use crate::state::AppState;

pub const COOKIE_NAME: &str = "session_token";
const NOT_AUTHORIZED: &str = "Not authorized";
const TOO_MANY_ATTEMPTS: &str = "Too many login attempts. Please try again later.";

/// Bearer token from `Authorization`, else the session cookie.
pub(crate) fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    let jar = CookieJar::from_headers(headers);
    jar.get(COOKIE_NAME)
        .map(Cookie::value)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(config.session_ttl)
        .build()
}

fn cleared_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user resolved from the bearer token or session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: UserProfile,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let app_state = AppState::from_ref(state);
        let user = app_state
            .auth
            .authenticate(&token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "token check failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user, token })
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// HTTP status for a failed envelope.
pub(crate) fn failure_status(message: &str) -> StatusCode {
    match message {
        INVALID_CREDENTIALS | NOT_AUTHENTICATED => StatusCode::UNAUTHORIZED,
        NOT_AUTHORIZED => StatusCode::FORBIDDEN,
        USER_NOT_FOUND => StatusCode::NOT_FOUND,
        EMAIL_TAKEN => StatusCode::CONFLICT,
        TOO_MANY_ATTEMPTS => StatusCode::TOO_MANY_REQUESTS,
        UNEXPECTED_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn envelope<T: Serialize>(response: ServiceResponse<T>, success: StatusCode) -> Response {
    let status = response.message().map_or(success, failure_status);
    (status, Json(response)).into_response()
}

fn failure(message: &str) -> Response {
    envelope(ServiceResponse::<()>::Failure(message.to_owned()), StatusCode::OK)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /auth/login`: check credentials, set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    jar: CookieJar,
    Json(credentials): Json<Credentials>,
) -> Response {
    let key = format!(
        "{}|{}",
        meta.ip_address.as_deref().unwrap_or("unknown"),
        credentials.email.trim().to_ascii_lowercase()
    );
    if let Err(e) = state.login_limiter.check_and_record(&key) {
        tracing::warn!(error = %e, "login throttled");
        return failure(TOO_MANY_ATTEMPTS);
    }

    let response = state.auth.login(&credentials).await;
    let Some(token) = response.data().map(|d| d.token.clone()) else {
        return envelope(response, StatusCode::OK);
    };
    state.login_limiter.reset(&key);

    let jar = jar.add(session_cookie(token, &state.config));
    (jar, Json(response)).into_response()
}

/// `POST /auth/logout`: end the session if there is one, always clear the cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let response = match token_from_headers(&headers) {
        Some(token) => state.auth.logout(&token).await,
        None => ServiceResponse::Success(()),
    };
    let jar = CookieJar::new().add(cleared_cookie(&state.config));
    (jar, envelope(response, StatusCode::OK)).into_response()
}

/// `POST /auth/register`: self-service student signup.
pub async fn register(State(state): State<AppState>, Json(registration): Json<Registration>) -> Response {
    envelope(state.auth.register(&registration).await, StatusCode::CREATED)
}

/// `GET /auth/profile`
pub async fn profile(State(state): State<AppState>, auth: AuthUser) -> Response {
    envelope(state.auth.get_profile(&auth.token).await, StatusCode::OK)
}

/// `PATCH /auth/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Response {
    envelope(state.auth.update_profile(&auth.token, &update).await, StatusCode::OK)
}

/// `POST /auth/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(change): Json<PasswordChange>,
) -> Response {
    envelope(state.auth.change_password(&auth.token, &change).await, StatusCode::OK)
}

/// `POST /auth/verify-token`: report whether the presented token is live.
pub async fn verify_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let response = match token_from_headers(&headers) {
        Some(token) => state.auth.verify_token(&token).await,
        None => ServiceResponse::Success(TokenStatus { valid: false }),
    };
    envelope(response, StatusCode::OK)
}

/// `GET /auth/users`: admins only; campus admins see their campuses' users.
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> Response {
    if !auth.user.role.is_admin() {
        return failure(NOT_AUTHORIZED);
    }
    let response = match state.auth.get_all_users().await {
        ServiceResponse::Success(users) => ServiceResponse::Success(
            users
                .into_iter()
                .filter(|u| can_access_campus(&auth.user, u.campus_id))
                .collect::<Vec<_>>(),
        ),
        ServiceResponse::Failure(message) => ServiceResponse::Failure(message),
    };
    envelope(response, StatusCode::OK)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
