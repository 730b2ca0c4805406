use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::time::Instant;

use crate::http::{HttpHeaders, header_get};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Window the GitHub `X-RateLimit-Limit` budget applies to.
pub const GITHUB_RATE_WINDOW: Duration = Duration::from_secs(3600);

/// Rate limit information parsed from response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed per window.
    pub limit: usize,
    /// Remaining requests in the current window.
    pub remaining: usize,
    /// When the window resets, if the server said so.
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitInfo {
    /// Parse `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
    ///
    /// Limit and remaining are required; the reset epoch is optional.
    pub fn from_headers(headers: &HttpHeaders) -> Option<Self> {
        let limit = header_get(headers, "x-ratelimit-limit")?
            .trim()
            .parse::<usize>()
            .ok()?;
        let remaining = header_get(headers, "x-ratelimit-remaining")?
            .trim()
            .parse::<usize>()
            .ok()?;
        let reset_at = header_get(headers, "x-ratelimit-reset")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|epoch| DateTime::from_timestamp(epoch, 0));
        Some(Self {
            limit,
            remaining,
            reset_at,
        })
    }

    /// Even spacing that spends exactly `limit` requests per `window`.
    pub fn min_interval(&self, window: Duration) -> Duration {
        match u32::try_from(self.limit) {
            Ok(limit) if limit > 0 => window / limit,
            Ok(_) => window,
            Err(_) => Duration::ZERO,
        }
    }
}

/// Header-driven pacing with a deferred wait.
///
/// A response never delays the caller that received it. Instead `observe`
/// records the earliest instant the next request may start, and `wait`
/// sleeps until then.
#[derive(Debug, Clone)]
pub struct HeaderPacer {
    window: Duration,
    not_before: Option<Instant>,
}

impl HeaderPacer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            not_before: None,
        }
    }

    /// Sleep until the next request is allowed.
    pub async fn wait(&self) {
        if let Some(at) = self.not_before {
            tokio::time::sleep_until(at).await;
        }
    }

    /// Record the budget reported for a request that started at `started`.
    pub fn observe(&mut self, started: Instant, info: &RateLimitInfo) {
        let mut next = started + info.min_interval(self.window);

        if info.remaining == 0
            && let Some(reset_at) = info.reset_at
            && let Ok(until_reset) = (reset_at - Utc::now()).to_std()
        {
            next = next.max(Instant::now() + until_reset);
        }

        self.not_before = Some(next);
    }

    /// Push the next request out to `reset_at` (used on explicit 403/429).
    pub fn defer_until(&mut self, reset_at: DateTime<Utc>) {
        let until_reset = (reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let at = Instant::now() + until_reset;
        self.not_before = Some(self.not_before.map_or(at, |prev| prev.max(at)));
    }

    #[must_use]
    pub fn not_before(&self) -> Option<Instant> {
        self.not_before
    }
}

/// A fixed-rate limiter using the governor crate.
///
/// Bitbucket pacing does not depend on response headers: every request is
/// spaced at least one period from the previous one.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Allow one request per `period`. A zero period falls back to one per second.
    pub fn with_period(period: Duration) -> Self {
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
        Self {
            inner: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HttpHeaders {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_github_headers() {
        let info = RateLimitInfo::from_headers(&headers(&[
            ("X-RateLimit-Limit", "5000"),
            ("X-RateLimit-Remaining", "4999"),
            ("X-RateLimit-Reset", "1706400000"),
        ]))
        .expect("headers should parse");
        assert_eq!(info.limit, 5000);
        assert_eq!(info.remaining, 4999);
        assert_eq!(info.reset_at.map(|t| t.timestamp()), Some(1_706_400_000));
    }

    #[test]
    fn missing_or_invalid_headers_yield_none() {
        assert!(RateLimitInfo::from_headers(&Vec::new()).is_none());
        assert!(
            RateLimitInfo::from_headers(&headers(&[
                ("x-ratelimit-limit", "lots"),
                ("x-ratelimit-remaining", "1"),
            ]))
            .is_none()
        );
    }

    #[test]
    fn reset_header_is_optional() {
        let info = RateLimitInfo::from_headers(&headers(&[
            ("x-ratelimit-limit", "60"),
            ("x-ratelimit-remaining", "59"),
        ]))
        .expect("headers should parse");
        assert!(info.reset_at.is_none());
    }

    #[test]
    fn min_interval_divides_window_by_limit() {
        let info = RateLimitInfo {
            limit: 5000,
            remaining: 4999,
            reset_at: None,
        };
        assert_eq!(
            info.min_interval(GITHUB_RATE_WINDOW),
            Duration::from_millis(720)
        );

        let zero = RateLimitInfo {
            limit: 0,
            remaining: 0,
            reset_at: None,
        };
        assert_eq!(zero.min_interval(GITHUB_RATE_WINDOW), GITHUB_RATE_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_defers_next_request_by_min_interval() {
        let mut pacer = HeaderPacer::new(GITHUB_RATE_WINDOW);
        let start = Instant::now();

        // No observation yet: no wait.
        pacer.wait().await;
        assert_eq!(Instant::now(), start);

        pacer.observe(
            start,
            &RateLimitInfo {
                limit: 5000,
                remaining: 4999,
                reset_at: None,
            },
        );
        pacer.wait().await;
        assert!(Instant::now() - start >= Duration::from_millis(720));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_waits_for_reset() {
        let mut pacer = HeaderPacer::new(GITHUB_RATE_WINDOW);
        let start = Instant::now();
        pacer.observe(
            start,
            &RateLimitInfo {
                limit: 5000,
                remaining: 0,
                reset_at: Some(Utc::now() + chrono::Duration::seconds(30)),
            },
        );
        let not_before = pacer.not_before().expect("deadline recorded");
        assert!(not_before - start >= Duration::from_secs(29));
    }

    #[tokio::test]
    async fn api_rate_limiter_allows_first_request_immediately() {
        let limiter = ApiRateLimiter::with_period(Duration::from_secs(60));
        let start = std::time::Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn zero_period_falls_back_to_default_quota() {
        let _limiter = ApiRateLimiter::with_period(Duration::ZERO);
    }
}
