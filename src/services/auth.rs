//! Authentication contract shared by the mock and session backends.
//!
//! DESIGN
//! ======
//! Every [`AuthBackend`] operation answers with a [`ServiceResponse`]:
//! `{"success": true, "data": ...}` or `{"success": false, "message": ...}`.
//! Expected failures (bad password, unknown user) carry a fixed user-facing
//! message. Anything else is logged with its cause and flattened to
//! [`UNEXPECTED_ERROR`] so internals never leak to the client.
//!
//! [`AuthBackend::authenticate`] is the exception: it is used by the request
//! extractor, which needs to tell "no such session" apart from "database
//! down", so it returns a plain `Result`.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::error;

use super::accounts::UserProfile;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const USER_NOT_FOUND: &str = "User not found";
pub const EMAIL_TAKEN: &str = "Email is already registered";
pub const WRONG_PASSWORD: &str = "Current password is incorrect";
pub const NOT_AUTHENTICATED: &str = "Not authenticated";
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

pub const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("email already registered")]
    EmailTaken,
    #[error("current password mismatch")]
    WrongPassword,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("client storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Whether this is a normal outcome the user can act on.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Hash(_) | Self::Storage(_))
    }

    /// Message safe to show to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => INVALID_CREDENTIALS.to_owned(),
            Self::UserNotFound => USER_NOT_FOUND.to_owned(),
            Self::EmailTaken => EMAIL_TAKEN.to_owned(),
            Self::WrongPassword => WRONG_PASSWORD.to_owned(),
            Self::NotAuthenticated => NOT_AUTHENTICATED.to_owned(),
            Self::Validation(message) => message.clone(),
            Self::Database(_) | Self::Hash(_) | Self::Storage(_) => UNEXPECTED_ERROR.to_owned(),
        }
    }
}

// =============================================================================
// RESPONSE ENVELOPE
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse<T> {
    Success(T),
    Failure(String),
}

impl<T> ServiceResponse<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(message) => Some(message),
        }
    }

    /// Fold a backend result into the envelope, logging unexpected faults.
    #[must_use]
    pub fn from_result(operation: &'static str, result: Result<T, AuthError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(e) if e.is_expected() => Self::Failure(e.user_message()),
            Err(e) => {
                error!(operation, error = %e, "auth operation failed");
                Self::Failure(UNEXPECTED_ERROR.to_owned())
            }
        }
    }
}

impl<T: Serialize> Serialize for ServiceResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_struct("ServiceResponse", 2)?;
        match self {
            Self::Success(data) => {
                out.serialize_field("success", &true)?;
                out.serialize_field("data", data)?;
            }
            Self::Failure(message) => {
                out.serialize_field("success", &false)?;
                out.serialize_field("message", message)?;
            }
        }
        out.end()
    }
}

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub last_name: String,
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
}

impl Registration {
    /// Shape checks shared by both backends.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] describing the first problem.
    pub fn validate(&self) -> Result<(), AuthError> {
        if normalize_email(&self.email).is_none() {
            return Err(AuthError::Validation("A valid email address is required".into()));
        }
        validate_new_password(&self.password)?;
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AuthError::Validation("First and last name are required".into()));
        }
        Ok(())
    }
}

/// Partial profile edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub department: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<String>,
    pub section: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Apply the edit to an in-memory profile.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        let fields = [
            (&self.first_name, &mut profile.first_name),
            (&self.middle_name, &mut profile.middle_name),
            (&self.last_name, &mut profile.last_name),
            (&self.department, &mut profile.department),
            (&self.course, &mut profile.course),
            (&self.year_level, &mut profile.year_level),
            (&self.section, &mut profile.section),
            (&self.phone, &mut profile.phone),
        ];
        for (update, field) in fields {
            if let Some(value) = update {
                value.trim().clone_into(field);
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginData {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub valid: bool,
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ServiceResponse<LoginData>;

    async fn logout(&self, token: &str) -> ServiceResponse<()>;

    async fn register(&self, registration: &Registration) -> ServiceResponse<UserProfile>;

    async fn get_profile(&self, token: &str) -> ServiceResponse<UserProfile>;

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ServiceResponse<UserProfile>;

    async fn change_password(&self, token: &str, change: &PasswordChange) -> ServiceResponse<()>;

    async fn verify_token(&self, token: &str) -> ServiceResponse<TokenStatus>;

    async fn get_all_users(&self) -> ServiceResponse<Vec<UserProfile>>;

    /// Resolve a bearer or cookie token to its user.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] only for backend faults; an unknown or
    /// expired token is `Ok(None)`.
    async fn authenticate(&self, token: &str) -> Result<Option<UserProfile>, AuthError>;
}

// =============================================================================
// HELPERS
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

/// # Errors
///
/// Returns [`AuthError::Validation`] if the password is too short.
pub fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
