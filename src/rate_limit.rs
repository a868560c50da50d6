//! In-memory rate limiting for login attempts and attendance submissions.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<String, VecDeque<Instant>>`.
//! Each limiter enforces two limits:
//! - Per-key: e.g. 10 login attempts per address per minute
//! - Global: ceiling across all keys, protecting bcrypt and the pool
//!
//! Keys are opaque strings so one type serves both the login limiter
//! (keyed by client address plus normalized email) and the submission
//! throttle (keyed by user id and event), which absorbs accidental
//! double-submits from the check-in form.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::env_parse;

const DEFAULT_PER_KEY_LIMIT: usize = 10;
const DEFAULT_PER_KEY_WINDOW_SECS: u64 = 60;
const DEFAULT_GLOBAL_LIMIT: usize = 600;
const DEFAULT_GLOBAL_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_key_limit: usize,
    pub per_key_window: Duration,
    pub global_limit: usize,
    pub global_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_key_limit: DEFAULT_PER_KEY_LIMIT,
            per_key_window: Duration::from_secs(DEFAULT_PER_KEY_WINDOW_SECS),
            global_limit: DEFAULT_GLOBAL_LIMIT,
            global_window: Duration::from_secs(DEFAULT_GLOBAL_WINDOW_SECS),
        }
    }
}

impl RateLimitConfig {
    /// Read `{prefix}_PER_KEY`, `{prefix}_PER_KEY_WINDOW_SECS`,
    /// `{prefix}_GLOBAL` and `{prefix}_GLOBAL_WINDOW_SECS`, starting from `base`.
    #[must_use]
    pub fn from_env(prefix: &str, base: Self) -> Self {
        let per_key_window_secs = env_parse(&format!("{prefix}_PER_KEY_WINDOW_SECS"), base.per_key_window.as_secs());
        let global_window_secs = env_parse(&format!("{prefix}_GLOBAL_WINDOW_SECS"), base.global_window.as_secs());

        Self {
            per_key_limit: env_parse(&format!("{prefix}_PER_KEY"), base.per_key_limit),
            per_key_window: Duration::from_secs(per_key_window_secs),
            global_limit: env_parse(&format!("{prefix}_GLOBAL"), base.global_limit),
            global_window: Duration::from_secs(global_window_secs),
        }
    }

    /// Login attempts: 10 per address per minute.
    #[must_use]
    pub fn login() -> Self {
        Self::from_env("LOGIN_RATE_LIMIT", Self::default())
    }

    /// Attendance submissions: one per user and event every 10 seconds.
    #[must_use]
    pub fn submission() -> Self {
        Self::from_env(
            "SUBMIT_THROTTLE",
            Self { per_key_limit: 1, per_key_window: Duration::from_secs(10), ..Self::default() },
        )
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum RateLimitError {
    #[error("rate limit exceeded (max {limit} requests/{window_secs}s)")]
    PerKeyExceeded { limit: usize, window_secs: u64 },
    #[error("server busy (max {limit} requests/{window_secs}s)")]
    GlobalExceeded { limit: usize, window_secs: u64 },
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct RateLimiterInner {
    /// Per-key request timestamps.
    key_requests: HashMap<String, VecDeque<Instant>>,
    /// Global request timestamps.
    global_requests: VecDeque<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { inner: Arc::new(Mutex::new(RateLimiterInner::default())), config }
    }

    /// Check both per-key and global limits, then record the request.
    ///
    /// # Errors
    ///
    /// Returns a [`RateLimitError`] naming the limit that was hit. Rejected
    /// requests are not recorded.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(key, Instant::now())
    }

    /// Check + record with explicit timestamp (for testing).
    pub(crate) fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let cfg = self.config;

        prune_window(&mut inner.global_requests, now, cfg.global_window);
        if inner.global_requests.len() >= cfg.global_limit {
            return Err(RateLimitError::GlobalExceeded {
                limit: cfg.global_limit,
                window_secs: cfg.global_window.as_secs(),
            });
        }

        let key_deque = inner.key_requests.entry(key.to_owned()).or_default();
        prune_window(key_deque, now, cfg.per_key_window);
        if key_deque.len() >= cfg.per_key_limit {
            return Err(RateLimitError::PerKeyExceeded {
                limit: cfg.per_key_limit,
                window_secs: cfg.per_key_window.as_secs(),
            });
        }

        key_deque.push_back(now);
        inner.global_requests.push_back(now);

        // Idle keys would otherwise accumulate forever.
        let per_key_window = cfg.per_key_window;
        inner
            .key_requests
            .retain(|_, deque| deque.back().is_some_and(|last| now.duration_since(*last) <= per_key_window));

        Ok(())
    }

    /// Forget a key's history, e.g. after a successful login.
    pub fn reset(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.key_requests.remove(key);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .key_requests
            .len()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
