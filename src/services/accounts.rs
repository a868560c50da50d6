//! User accounts and the Postgres-backed [`AuthBackend`].
//!
//! Passwords are bcrypt hashes. bcrypt is deliberately slow, so hashing and
//! verification run on the blocking pool instead of a runtime worker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;

use super::auth::{
    AuthBackend, AuthError, Credentials, LoginData, PasswordChange, ProfileUpdate, Registration, ServiceResponse,
    TokenStatus, normalize_email, validate_new_password,
};
use super::session;

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Organizer,
    /// Administers one campus, or an explicit list of campuses.
    #[serde(alias = "admin")]
    CampusAdmin,
    SuperAdmin,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Organizer => "organizer",
            Self::CampusAdmin => "campus_admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::CampusAdmin | Self::SuperAdmin)
    }

    /// Organizers and admins may create and edit events.
    #[must_use]
    pub fn can_manage_events(self) -> bool {
        self != Self::Student
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "organizer" => Ok(Self::Organizer),
            "campus_admin" | "admin" => Ok(Self::CampusAdmin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub last_name: String,
    pub role: Role,
    pub campus_id: i64,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub year_level: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_verified: bool,
    /// Explicit campus list for multi-campus admins. Empty means "own campus".
    #[serde(default)]
    pub accessible_campus_ids: Vec<i64>,
}

impl UserProfile {
    /// First, middle and last name joined with single spaces.
    #[must_use]
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub(crate) const USER_COLUMNS: &str = "id, email, first_name, middle_name, last_name, role, campus_id, student_id, \
     department, course, year_level, section, phone, is_verified, accessible_campus_ids";

/// Map a row selected with [`USER_COLUMNS`].
pub(crate) fn profile_from_row(row: &PgRow) -> Result<UserProfile, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(UserProfile {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        middle_name: row.try_get("middle_name")?,
        last_name: row.try_get("last_name")?,
        role: role.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        campus_id: row.try_get("campus_id")?,
        student_id: row.try_get("student_id")?,
        department: row.try_get("department")?,
        course: row.try_get("course")?,
        year_level: row.try_get("year_level")?,
        section: row.try_get("section")?,
        phone: row.try_get("phone")?,
        is_verified: row.try_get("is_verified")?,
        accessible_campus_ids: row.try_get("accessible_campus_ids")?,
    })
}

// =============================================================================
// PASSWORDS
// =============================================================================

/// Hash a password off the async runtime.
///
/// # Errors
///
/// Returns [`AuthError::Hash`] if bcrypt fails or the task panics.
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check a password against a stored bcrypt hash off the async runtime.
///
/// # Errors
///
/// Returns [`AuthError::Hash`] if the stored hash is malformed.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hash(e.to_string()))?
        .map_err(|e| AuthError::Hash(e.to_string()))
}

// =============================================================================
// QUERIES
// =============================================================================

async fn find_credentials(pool: &PgPool, email: &str) -> Result<Option<(UserProfile, String)>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE lower(email) = $1 AND is_active"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let hash: String = row.try_get("password_hash")?;
    Ok(Some((profile_from_row(&row)?, hash)))
}

async fn password_hash_for(pool: &PgPool, user_id: i64) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// List every user ordered by id.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserProfile>, sqlx::Error> {
    let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
        .fetch_all(pool)
        .await?;
    rows.iter().map(profile_from_row).collect()
}

/// Insert a student account.
///
/// # Errors
///
/// Returns [`AuthError::EmailTaken`] on a duplicate address, or a database error.
pub async fn create_user(pool: &PgPool, registration: &Registration, password_hash: &str) -> Result<UserProfile, AuthError> {
    let email = normalize_email(&registration.email)
        .ok_or_else(|| AuthError::Validation("A valid email address is required".into()))?;
    let result = sqlx::query(&format!(
        "INSERT INTO users (email, password_hash, first_name, middle_name, last_name, role, campus_id, student_id,
                            department, course, year_level, section, phone)
         VALUES ($1, $2, $3, $4, $5, 'student', $6, $7, $8, $9, $10, $11, $12)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&email)
    .bind(password_hash)
    .bind(registration.first_name.trim())
    .bind(registration.middle_name.trim())
    .bind(registration.last_name.trim())
    .bind(registration.campus_id)
    .bind(registration.student_id.as_deref().map(str::trim).filter(|s| !s.is_empty()))
    .bind(&registration.department)
    .bind(&registration.course)
    .bind(&registration.year_level)
    .bind(&registration.section)
    .bind(&registration.phone)
    .fetch_one(pool)
    .await;

    match result {
        Ok(row) => Ok(profile_from_row(&row)?),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AuthError::EmailTaken),
        Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
            Err(AuthError::Validation("Unknown campus".into()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn apply_profile_update(pool: &PgPool, user_id: i64, update: &ProfileUpdate) -> Result<Option<UserProfile>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "UPDATE users SET
             first_name  = COALESCE($2, first_name),
             middle_name = COALESCE($3, middle_name),
             last_name   = COALESCE($4, last_name),
             department  = COALESCE($5, department),
             course      = COALESCE($6, course),
             year_level  = COALESCE($7, year_level),
             section     = COALESCE($8, section),
             phone       = COALESCE($9, phone),
             updated_at  = now()
         WHERE id = $1
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(update.first_name.as_deref().map(str::trim))
    .bind(update.middle_name.as_deref().map(str::trim))
    .bind(update.last_name.as_deref().map(str::trim))
    .bind(update.department.as_deref().map(str::trim))
    .bind(update.course.as_deref().map(str::trim))
    .bind(update.year_level.as_deref().map(str::trim))
    .bind(update.section.as_deref().map(str::trim))
    .bind(update.phone.as_deref().map(str::trim))
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(profile_from_row).transpose()
}

// =============================================================================
// SESSION BACKEND
// =============================================================================

/// Real credential checks against the `users` table with server-side sessions.
pub struct SessionAuthService {
    pool: PgPool,
    ttl: time::Duration,
}

impl SessionAuthService {
    #[must_use]
    pub fn new(pool: PgPool, ttl: time::Duration) -> Self {
        Self { pool, ttl }
    }

    async fn require_user(&self, token: &str) -> Result<UserProfile, AuthError> {
        session::validate_session(&self.pool, token)
            .await?
            .ok_or(AuthError::NotAuthenticated)
    }

    async fn try_login(&self, credentials: &Credentials) -> Result<LoginData, AuthError> {
        let email = normalize_email(&credentials.email).ok_or(AuthError::InvalidCredentials)?;
        let Some((user, hash)) = find_credentials(&self.pool, &email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(&credentials.password, &hash).await? {
            return Err(AuthError::InvalidCredentials);
        }
        let token = session::create_session(&self.pool, user.id, self.ttl).await?;
        info!(user_id = user.id, "user logged in");
        Ok(LoginData { token, user })
    }

    async fn try_register(&self, registration: &Registration) -> Result<UserProfile, AuthError> {
        registration.validate()?;
        let hash = hash_password(&registration.password).await?;
        let user = create_user(&self.pool, registration, &hash).await?;
        info!(user_id = user.id, campus_id = user.campus_id, "user registered");
        Ok(user)
    }

    async fn try_update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<UserProfile, AuthError> {
        let user = self.require_user(token).await?;
        apply_profile_update(&self.pool, user.id, update)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn try_change_password(&self, token: &str, change: &PasswordChange) -> Result<(), AuthError> {
        let user = self.require_user(token).await?;
        let hash = password_hash_for(&self.pool, user.id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !verify_password(&change.current_password, &hash).await? {
            return Err(AuthError::WrongPassword);
        }
        validate_new_password(&change.new_password)?;
        let new_hash = hash_password(&change.new_password).await?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user.id)
            .bind(new_hash)
            .execute(&self.pool)
            .await?;
        // Other devices must sign in again with the new password.
        session::delete_other_sessions(&self.pool, user.id, token).await?;
        info!(user_id = user.id, "password changed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthBackend for SessionAuthService {
    async fn login(&self, credentials: &Credentials) -> ServiceResponse<LoginData> {
        ServiceResponse::from_result("login", self.try_login(credentials).await)
    }

    async fn logout(&self, token: &str) -> ServiceResponse<()> {
        let result = session::delete_session(&self.pool, token)
            .await
            .map_err(AuthError::from);
        ServiceResponse::from_result("logout", result)
    }

    async fn register(&self, registration: &Registration) -> ServiceResponse<UserProfile> {
        ServiceResponse::from_result("register", self.try_register(registration).await)
    }

    async fn get_profile(&self, token: &str) -> ServiceResponse<UserProfile> {
        ServiceResponse::from_result("get_profile", self.require_user(token).await)
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ServiceResponse<UserProfile> {
        ServiceResponse::from_result("update_profile", self.try_update_profile(token, update).await)
    }

    async fn change_password(&self, token: &str, change: &PasswordChange) -> ServiceResponse<()> {
        ServiceResponse::from_result("change_password", self.try_change_password(token, change).await)
    }

    async fn verify_token(&self, token: &str) -> ServiceResponse<TokenStatus> {
        let result = session::validate_session(&self.pool, token)
            .await
            .map(|user| TokenStatus { valid: user.is_some() })
            .map_err(AuthError::from);
        ServiceResponse::from_result("verify_token", result)
    }

    async fn get_all_users(&self) -> ServiceResponse<Vec<UserProfile>> {
        let result = list_users(&self.pool).await.map_err(AuthError::from);
        ServiceResponse::from_result("get_all_users", result)
    }

    async fn authenticate(&self, token: &str) -> Result<Option<UserProfile>, AuthError> {
        Ok(session::validate_session(&self.pool, token).await?)
    }
}

#[cfg(test)]
#[path = "accounts_test.rs"]
mod tests;
