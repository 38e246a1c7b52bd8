use super::*;
use axum::http::HeaderValue;

const T0: u64 = 1_700_000_000_000;

fn limiter(max_requests: u32) -> RateLimiter {
    RateLimiter::new(RateLimitConfig { max_requests, window_ms: 60_000 })
}

fn tracked(rl: &RateLimiter) -> usize {
    rl.inner.lock().unwrap().len()
}

#[test]
fn allows_up_to_limit_with_descending_remaining() {
    let rl = limiter(3);
    let remaining: Vec<u32> = (0..3)
        .map(|i| rl.check_limit_at("10.0.0.1", T0 + i).unwrap().remaining)
        .collect();
    assert_eq!(remaining, vec![2, 1, 0]);

    let err = rl.check_limit_at("10.0.0.1", T0 + 10).unwrap_err();
    assert_eq!(err, RateLimitError::Exceeded { limit: 3, reset_ms: T0 + 60_000 });
}

#[test]
fn window_end_is_fixed_at_first_request() {
    let rl = limiter(3);
    let first = rl.check_limit_at("a", T0).unwrap();
    let second = rl.check_limit_at("a", T0 + 30_000).unwrap();
    assert_eq!(first.reset_ms, T0 + 60_000);
    assert_eq!(second.reset_ms, first.reset_ms);
}

#[test]
fn rejected_requests_are_not_counted() {
    let rl = limiter(1);
    rl.check_limit_at("a", T0).unwrap();
    for i in 1..5 {
        assert!(rl.check_limit_at("a", T0 + i).is_err());
    }
    let record_count = rl.inner.lock().unwrap().get("a").map(|r| r.count);
    assert_eq!(record_count, Some(1));
}

#[test]
fn fresh_window_after_reset_time_passes() {
    let rl = limiter(3);
    for _ in 0..3 {
        rl.check_limit_at("a", T0).unwrap();
    }
    assert!(rl.check_limit_at("a", T0 + 1).is_err());

    // Still inside the window at exactly the reset instant.
    assert!(rl.check_limit_at("a", T0 + 60_000).is_err());

    let quota = rl.check_limit_at("a", T0 + 60_001).unwrap();
    assert_eq!(quota.remaining, 2);
    assert_eq!(quota.reset_ms, T0 + 60_001 + 60_000);
}

#[test]
fn distinct_identifiers_do_not_interfere() {
    let rl = limiter(2);
    rl.check_limit_at("a", T0).unwrap();
    rl.check_limit_at("a", T0).unwrap();
    assert!(rl.check_limit_at("a", T0).is_err());

    let b = rl.check_limit_at("b", T0).unwrap();
    assert_eq!(b.remaining, 1);
}

#[test]
fn expired_records_are_purged_on_any_check() {
    let rl = limiter(5);
    rl.check_limit_at("a", T0).unwrap();
    rl.check_limit_at("b", T0).unwrap();
    assert_eq!(tracked(&rl), 2);

    rl.check_limit_at("c", T0 + 120_000).unwrap();
    assert_eq!(tracked(&rl), 1);
}

#[test]
fn reset_deletes_record() {
    let rl = limiter(1);
    rl.check_limit_at("a", T0).unwrap();
    assert!(rl.check_limit_at("a", T0).is_err());
    rl.reset("a");
    assert_eq!(rl.check_limit_at("a", T0).unwrap().remaining, 0);
}

#[test]
fn zero_limit_is_raised_to_one() {
    let rl = limiter(0);
    assert_eq!(rl.limit(), 1);
    assert!(rl.check_limit_at("a", T0).is_ok());
    assert!(rl.check_limit_at("a", T0).is_err());
}

#[test]
fn defaults_are_ten_per_minute() {
    let cfg = RateLimitConfig::default();
    assert_eq!(cfg, RateLimitConfig { max_requests: 10, window_ms: 60_000 });
    assert_eq!(RateLimiter::default().limit(), 10);
}

#[test]
fn concurrent_checks_never_oversubscribe() {
    let rl = limiter(10);
    let allowed = std::sync::atomic::AtomicUsize::new(0);
    std::thread::scope(|s| {
        for _ in 0..64 {
            s.spawn(|| {
                if rl.check_limit("shared").is_ok() {
                    allowed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            });
        }
    });
    assert_eq!(allowed.into_inner(), 10);
}

// =============================================================================
// client_identifier
// =============================================================================

fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_static(value));
    }
    map
}

#[test]
fn identifier_prefers_first_forwarded_entry() {
    let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1"), ("x-real-ip", "198.51.100.2")]);
    assert_eq!(client_identifier(&h), "203.0.113.7");
}

#[test]
fn identifier_falls_back_to_real_ip() {
    let h = headers(&[("x-real-ip", "198.51.100.2")]);
    assert_eq!(client_identifier(&h), "198.51.100.2");
}

#[test]
fn identifier_skips_empty_forwarded_entry() {
    let h = headers(&[("x-forwarded-for", " , 10.0.0.1"), ("x-real-ip", "198.51.100.2")]);
    assert_eq!(client_identifier(&h), "198.51.100.2");
}

#[test]
fn identifier_defaults_to_shared_unknown_bucket() {
    assert_eq!(client_identifier(&HeaderMap::new()), UNKNOWN_CLIENT);
}

#[test]
fn quota_headers_render_all_three_fields() {
    let h = Quota { limit: 10, remaining: 9, reset_ms: T0 }.headers();
    assert_eq!(h.get("x-ratelimit-limit").unwrap(), "10");
    assert_eq!(h.get("x-ratelimit-remaining").unwrap(), "9");
    assert_eq!(h.get("x-ratelimit-reset").unwrap(), &T0.to_string());
}
