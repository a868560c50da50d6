//! Development-only [`AuthBackend`] over a static user fixture.
//!
//! DESIGN
//! ======
//! Users come from `fixtures/mock_users.json`, compiled into the binary and
//! never written back: register / update / change-password answer with
//! modified copies. Every call sleeps for a configurable delay first, to
//! imitate network latency. Overlapping calls are not serialized.
//!
//! Tokens are `mock-jwt-token-{id}-{unix_millis}`: unsigned, never expire,
//! and trivially forgeable. Never select this backend in production.
//!
//! Login and logout also mirror the client's persistent storage through
//! [`ClientStorage`], keyed by [`TOKEN_KEY`] and [`USER_KEY`]. The store models
//! a single client: when the server runs this backend, every HTTP client
//! shares it, so the latest login owns the keys and any logout clears them.
//! Request authentication never reads the store; it goes by the token alone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::debug;

use super::accounts::{Role, UserProfile};
use super::auth::{
    AuthBackend, AuthError, Credentials, LoginData, PasswordChange, ProfileUpdate, Registration, ServiceResponse,
    TokenStatus, normalize_email, validate_new_password,
};

pub const TOKEN_PREFIX: &str = "mock-jwt-token-";
pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";

const FIXTURE: &str = include_str!("../../fixtures/mock_users.json");

// =============================================================================
// CLIENT STORAGE
// =============================================================================

/// Persistent key/value store on the client side.
pub trait ClientStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    /// # Errors
    ///
    /// Returns a description of the failure if the value cannot be stored.
    fn set(&self, key: &str, value: String) -> Result<(), String>;
    fn remove(&self, key: &str);
}

/// In-process [`ClientStorage`].
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

// =============================================================================
// FIXTURE
// =============================================================================

/// Fixture record: a profile plus its plaintext test password.
#[derive(Debug, Clone, Deserialize)]
pub struct MockUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub password: String,
}

/// Parse the bundled fixture.
///
/// # Errors
///
/// Returns a JSON error if the fixture is malformed.
pub fn fixture_users() -> Result<Vec<MockUser>, serde_json::Error> {
    serde_json::from_str(FIXTURE)
}

/// Build a token for `user_id` at `now`.
#[must_use]
pub fn mint_token(user_id: i64, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{TOKEN_PREFIX}{user_id}-{millis}")
}

/// Extract the user id embedded in a mock token.
#[must_use]
pub fn token_user_id(token: &str) -> Option<i64> {
    let rest = token.strip_prefix(TOKEN_PREFIX)?;
    let (id, millis) = rest.split_once('-')?;
    millis.parse::<i128>().ok()?;
    id.parse().ok()
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct MockAuthService {
    users: Vec<MockUser>,
    delay: Duration,
    storage: Arc<dyn ClientStorage>,
}

impl MockAuthService {
    #[must_use]
    pub fn new(users: Vec<MockUser>, delay: Duration, storage: Arc<dyn ClientStorage>) -> Self {
        Self { users, delay, storage }
    }

    /// Service over the bundled fixture.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the fixture is malformed.
    pub fn from_fixture(delay: Duration, storage: Arc<dyn ClientStorage>) -> Result<Self, serde_json::Error> {
        Ok(Self::new(fixture_users()?, delay, storage))
    }

    async fn simulate_latency(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn by_email(&self, email: &str) -> Option<&MockUser> {
        self.users.iter().find(|u| u.profile.email == email)
    }

    fn by_id(&self, id: i64) -> Option<&MockUser> {
        self.users.iter().find(|u| u.profile.id == id)
    }

    fn by_token(&self, token: &str) -> Result<&MockUser, AuthError> {
        let id = token_user_id(token).ok_or(AuthError::NotAuthenticated)?;
        self.by_id(id).ok_or(AuthError::UserNotFound)
    }

    fn try_login(&self, credentials: &Credentials) -> Result<LoginData, AuthError> {
        let user = self
            .by_email(credentials.email.trim())
            .filter(|u| u.password == credentials.password)
            .ok_or(AuthError::InvalidCredentials)?;

        if let Some(previous) = self.storage.get(TOKEN_KEY) {
            debug!(
                previous_user = ?token_user_id(&previous),
                user_id = user.profile.id,
                "replacing stored mock session"
            );
        }
        let token = mint_token(user.profile.id, OffsetDateTime::now_utc());
        let stored_user = serde_json::to_string(&user.profile).map_err(|e| AuthError::Storage(e.to_string()))?;
        self.storage
            .set(TOKEN_KEY, token.clone())
            .map_err(AuthError::Storage)?;
        self.storage
            .set(USER_KEY, stored_user)
            .map_err(AuthError::Storage)?;

        Ok(LoginData { token, user: user.profile.clone() })
    }

    fn try_register(&self, registration: &Registration) -> Result<UserProfile, AuthError> {
        registration.validate()?;
        let email = normalize_email(&registration.email).unwrap_or_default();
        if self
            .users
            .iter()
            .any(|u| u.profile.email.eq_ignore_ascii_case(&email))
        {
            return Err(AuthError::EmailTaken);
        }
        let next_id = self.users.iter().map(|u| u.profile.id).max().unwrap_or(0) + 1;

        Ok(UserProfile {
            id: next_id,
            email,
            first_name: registration.first_name.trim().to_owned(),
            middle_name: registration.middle_name.trim().to_owned(),
            last_name: registration.last_name.trim().to_owned(),
            role: Role::Student,
            campus_id: registration.campus_id,
            student_id: registration.student_id.clone(),
            department: registration.department.clone(),
            course: registration.course.clone(),
            year_level: registration.year_level.clone(),
            section: registration.section.clone(),
            phone: registration.phone.clone(),
            is_verified: false,
            accessible_campus_ids: Vec::new(),
        })
    }

    fn try_change_password(&self, token: &str, change: &PasswordChange) -> Result<(), AuthError> {
        let user = self.by_token(token)?;
        if user.password != change.current_password {
            return Err(AuthError::WrongPassword);
        }
        validate_new_password(&change.new_password)
    }
}

#[async_trait::async_trait]
impl AuthBackend for MockAuthService {
    async fn login(&self, credentials: &Credentials) -> ServiceResponse<LoginData> {
        self.simulate_latency().await;
        ServiceResponse::from_result("login", self.try_login(credentials))
    }

    async fn logout(&self, _token: &str) -> ServiceResponse<()> {
        self.simulate_latency().await;
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(USER_KEY);
        ServiceResponse::Success(())
    }

    async fn register(&self, registration: &Registration) -> ServiceResponse<UserProfile> {
        self.simulate_latency().await;
        ServiceResponse::from_result("register", self.try_register(registration))
    }

    async fn get_profile(&self, token: &str) -> ServiceResponse<UserProfile> {
        self.simulate_latency().await;
        let result = self.by_token(token).map(|u| u.profile.clone());
        ServiceResponse::from_result("get_profile", result)
    }

    async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> ServiceResponse<UserProfile> {
        self.simulate_latency().await;
        let result = self.by_token(token).map(|u| {
            let mut profile = u.profile.clone();
            update.apply_to(&mut profile);
            profile
        });
        ServiceResponse::from_result("update_profile", result)
    }

    async fn change_password(&self, token: &str, change: &PasswordChange) -> ServiceResponse<()> {
        self.simulate_latency().await;
        ServiceResponse::from_result("change_password", self.try_change_password(token, change))
    }

    async fn verify_token(&self, token: &str) -> ServiceResponse<TokenStatus> {
        self.simulate_latency().await;
        ServiceResponse::Success(TokenStatus { valid: token.starts_with(TOKEN_PREFIX) })
    }

    async fn get_all_users(&self) -> ServiceResponse<Vec<UserProfile>> {
        self.simulate_latency().await;
        ServiceResponse::Success(self.users.iter().map(|u| u.profile.clone()).collect())
    }

    async fn authenticate(&self, token: &str) -> Result<Option<UserProfile>, AuthError> {
        Ok(token_user_id(token)
            .and_then(|id| self.by_id(id))
            .map(|u| u.profile.clone()))
    }
}

#[cfg(test)]
#[path = "mock_auth_test.rs"]
mod tests;
