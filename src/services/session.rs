//! Server-side session management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses random 32-byte session tokens handed to the client once.
//! Only the SHA-256 of each token is stored, so a leaked `sessions` table
//! cannot be replayed. Sessions expire after a configurable TTL.

use std::fmt::Write;
use std::time::Duration;

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::accounts::{USER_COLUMNS, UserProfile, profile_from_row};

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Storage key for a token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    bytes_to_hex(&Sha256::digest(token.as_bytes()))
}

/// Create a session for the given user, returning the token.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(pool: &PgPool, user_id: i64, ttl: time::Duration) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + ttl;
    sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Validate a session token and return the associated active user.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<UserProfile>, sqlx::Error> {
    if token.is_empty() {
        return Ok(None);
    }
    let columns = USER_COLUMNS
        .split(", ")
        .map(|c| format!("u.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let row = sqlx::query(&format!(
        "SELECT {columns}
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = $1 AND s.expires_at > now() AND u.is_active"
    ))
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(profile_from_row).transpose()
}

/// Delete a session by token.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete every session of a user except the one holding `keep_token`.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_other_sessions(pool: &PgPool, user_id: i64, keep_token: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND token_hash <> $2")
        .bind(user_id)
        .bind(hash_token(keep_token))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Remove expired sessions. Returns the number deleted.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Spawn the hourly expired-session sweep. Returns a handle for shutdown.
pub fn spawn_purge_task(pool: PgPool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match purge_expired(&pool).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged expired sessions"),
                Err(e) => error!(error = %e, "session purge failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
