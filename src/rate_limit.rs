//! In-memory rate limiting for chat requests.
//!
//! DESIGN
//! ======
//! Fixed-window counters backed by `HashMap<String, QuotaRecord>`, keyed by
//! the client identifier derived from proxy headers. One record per
//! identifier; a record is replaced (never reset in place) once its window
//! has passed, and expired records are purged on every check. There is no
//! background sweeper.
//!
//! TRADE-OFFS
//! ==========
//! State is process-local. Multiple instances do not share quota, and every
//! client without proxy headers shares the single `"unknown"` bucket.
//!
//! Purge, lookup and mutation happen under one mutex acquisition with no
//! await point inside, so each check is an atomic read-modify-write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, HeaderName, HeaderValue};

const DEFAULT_MAX_REQUESTS: u32 = 10;
const DEFAULT_WINDOW_MS: u64 = 60_000;

pub const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared bucket for clients that carry no forwarding headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl RateLimitConfig {
    /// Read `RATE_LIMIT_MAX_REQUESTS` and `RATE_LIMIT_WINDOW_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_requests: env_parse("RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS),
            window_ms: env_parse("RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: DEFAULT_MAX_REQUESTS, window_ms: DEFAULT_WINDOW_MS }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded (max {limit} requests per window, resets at {reset_ms})")]
    Exceeded { limit: u32, reset_ms: u64 },
}

impl crate::error::ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }

    fn retryable(&self) -> bool {
        true
    }
}

/// Quota left after an accepted request. Surfaced as `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
    /// Window end, milliseconds since Unix epoch.
    pub reset_ms: u64,
}

impl Quota {
    /// `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(HEADER_LIMIT, HeaderValue::from(self.limit));
        headers.insert(HEADER_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(HEADER_RESET, HeaderValue::from(self.reset_ms));
        headers
    }
}

struct QuotaRecord {
    count: u32,
    window_reset_at_ms: u64,
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<String, QuotaRecord>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// A zero `max_requests` is raised to one.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig { max_requests: config.max_requests.max(1), ..config };
        Self { inner: Arc::new(Mutex::new(HashMap::new())), config }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(RateLimitConfig::from_env())
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.config.max_requests
    }

    /// Count a request against `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Exceeded`] when the window is already full.
    /// Rejected requests are not counted and do not move the window.
    pub fn check_limit(&self, identifier: &str) -> Result<Quota, RateLimitError> {
        self.check_limit_at(identifier, now_ms())
    }

    /// Internal: check + record with explicit timestamp (for testing).
    fn check_limit_at(&self, identifier: &str, now: u64) -> Result<Quota, RateLimitError> {
        let mut store = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config;

        store.retain(|_, record| now <= record.window_reset_at_ms);

        match store.get_mut(identifier) {
            None => {
                let reset_ms = now.saturating_add(cfg.window_ms);
                store.insert(identifier.to_owned(), QuotaRecord { count: 1, window_reset_at_ms: reset_ms });
                Ok(Quota { limit: cfg.max_requests, remaining: cfg.max_requests - 1, reset_ms })
            }
            Some(record) if record.count < cfg.max_requests => {
                record.count += 1;
                Ok(Quota {
                    limit: cfg.max_requests,
                    remaining: cfg.max_requests - record.count,
                    reset_ms: record.window_reset_at_ms,
                })
            }
            Some(record) => {
                Err(RateLimitError::Exceeded { limit: cfg.max_requests, reset_ms: record.window_reset_at_ms })
            }
        }
    }

    /// Drop any record for `identifier`.
    pub fn reset(&self, identifier: &str) {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(identifier);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

// =============================================================================
// CLIENT IDENTIFIER
// =============================================================================

/// First `X-Forwarded-For` entry, else `X-Real-IP`, else [`UNKNOWN_CLIENT`].
#[must_use]
pub fn client_identifier(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_owned()
}

// =============================================================================
// HELPERS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> u64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
