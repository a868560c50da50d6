//! Request context extractors: campus scope and client metadata.
//!
//! Every authenticated request works against one campus. Users default to
//! their home campus; admins may switch with `X-Campus-ID`, provided the
//! campus is one they can access. Anything else in the header is ignored
//! rather than rejected.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::http::StatusCode;

use super::auth::AuthUser;
use crate::services::attendance::ClientMeta;
use crate::services::campus::resolve_campus;
use crate::state::AppState;

pub const CAMPUS_ID_HEADER: &str = "x-campus-id";
pub const CAMPUS_CODE_HEADER: &str = "x-campus-code";

/// Authenticated caller plus the campus the request is scoped to.
pub struct CampusContext {
    pub auth: AuthUser,
    pub campus_id: i64,
}

/// Campus id from `X-Campus-ID`, if present and numeric.
pub(crate) fn requested_campus(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(CAMPUS_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl<S> FromRequestParts<S> for CampusContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        let campus_id = resolve_campus(&auth.user, requested_campus(&parts.headers));
        Ok(Self { auth, campus_id })
    }
}

/// Response headers naming the campus a response was scoped to.
pub(crate) fn campus_headers(campus_id: i64, code: &str) -> [(&'static str, String); 2] {
    [(CAMPUS_ID_HEADER, campus_id.to_string()), (CAMPUS_CODE_HEADER, code.to_owned())]
}

// =============================================================================
// CLIENT METADATA
// =============================================================================

/// Address a trusted reverse proxy reported: `X-Real-IP`, else the last
/// `X-Forwarded-For` hop (the one the proxy appended).
pub(crate) fn proxied_ip(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    header("x-real-ip")
        .or_else(|| header("x-forwarded-for").and_then(|v| v.rsplit(',').next()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Client address and user agent. Proxy headers are client-controlled
/// unless a proxy rewrites them, so they count only when `trust_proxy` is set.
pub(crate) fn client_meta(parts: &Parts, trust_proxy: bool) -> ClientMeta {
    let proxied = if trust_proxy { proxied_ip(&parts.headers) } else { None };
    let ip_address = proxied.or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    });
    let user_agent = parts
        .headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    ClientMeta { ip_address, user_agent }
}

impl<S> FromRequestParts<S> for ClientMeta
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trust_proxy = AppState::from_ref(state).config.trust_proxy_headers;
        Ok(client_meta(parts, trust_proxy))
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
