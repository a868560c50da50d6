use super::*;

fn limiter(per_key: usize, global: usize) -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        per_key_limit: per_key,
        per_key_window: Duration::from_secs(60),
        global_limit: global,
        global_window: Duration::from_secs(60),
    })
}

#[test]
fn per_key_allows_up_to_limit() {
    let rl = limiter(3, 100);
    let now = Instant::now();

    for i in 0..3 {
        assert!(rl.check_and_record_at("a@snsu.edu.ph", now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("a@snsu.edu.ph", now),
        Err(RateLimitError::PerKeyExceeded { limit: 3, window_secs: 60 })
    ));
}

#[test]
fn keys_are_independent() {
    let rl = limiter(1, 100);
    let now = Instant::now();

    rl.check_and_record_at("user:1", now).unwrap();
    assert!(rl.check_and_record_at("user:1", now).is_err());
    assert!(rl.check_and_record_at("user:2", now).is_ok());
}

#[test]
fn global_allows_up_to_limit() {
    let rl = limiter(10, 5);
    let now = Instant::now();

    for i in 0..5 {
        assert!(rl.check_and_record_at(&format!("k{i}"), now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("fresh", now),
        Err(RateLimitError::GlobalExceeded { limit: 5, .. })
    ));
}

#[test]
fn window_expiry_allows_new_requests() {
    let rl = limiter(2, 100);
    let start = Instant::now();

    rl.check_and_record_at("k", start).unwrap();
    rl.check_and_record_at("k", start).unwrap();
    assert!(rl.check_and_record_at("k", start).is_err());

    let later = start + Duration::from_secs(61);
    assert!(rl.check_and_record_at("k", later).is_ok());
}

#[test]
fn rejected_requests_are_not_recorded() {
    let rl = limiter(1, 100);
    let start = Instant::now();

    rl.check_and_record_at("k", start).unwrap();
    for _ in 0..5 {
        assert!(rl.check_and_record_at("k", start + Duration::from_secs(30)).is_err());
    }
    // Only the first request counts, so the window reopens 60s after it.
    assert!(rl.check_and_record_at("k", start + Duration::from_secs(61)).is_ok());
}

#[test]
fn reset_clears_key_history() {
    let rl = limiter(1, 100);
    let now = Instant::now();

    rl.check_and_record_at("k", now).unwrap();
    rl.reset("k");
    assert!(rl.check_and_record_at("k", now).is_ok());
}

#[test]
fn idle_keys_are_evicted() {
    let rl = limiter(5, 100);
    let start = Instant::now();

    rl.check_and_record_at("old", start).unwrap();
    rl.check_and_record_at("new", start + Duration::from_secs(120)).unwrap();
    assert_eq!(rl.tracked_keys(), 1);
}

#[test]
fn clones_share_state() {
    let rl = limiter(1, 100);
    let other = rl.clone();
    let now = Instant::now();

    rl.check_and_record_at("k", now).unwrap();
    assert!(other.check_and_record_at("k", now).is_err());
}

#[test]
fn submission_defaults_to_one_per_ten_seconds() {
    let cfg = RateLimitConfig::from_env(
        "__TEST_EAS_UNSET_PREFIX_5512__",
        RateLimitConfig { per_key_limit: 1, per_key_window: Duration::from_secs(10), ..RateLimitConfig::default() },
    );
    assert_eq!(cfg.per_key_limit, 1);
    assert_eq!(cfg.per_key_window, Duration::from_secs(10));
    assert_eq!(cfg.global_limit, 600);
}

#[test]
fn from_env_reads_prefixed_keys() {
    let prefix = "__TEST_EAS_RL_7731__";
    let key = format!("{prefix}_PER_KEY");
    unsafe { std::env::set_var(&key, "4") };
    let cfg = RateLimitConfig::from_env(prefix, RateLimitConfig::default());
    unsafe { std::env::remove_var(&key) };

    assert_eq!(cfg.per_key_limit, 4);
    assert_eq!(cfg.per_key_window, Duration::from_secs(60));
}
