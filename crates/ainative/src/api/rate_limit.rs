//! Proactive throttling from server-advertised quota.
//!
//! The server reports quota with `X-RateLimit-Limit`, `X-RateLimit-Remaining`
//! and `X-RateLimit-Reset`. [`RateLimiter::observe`] records the latest
//! values; [`RateLimiter::wait_time`] tells the caller how long to hold off
//! before the next request when the window is exhausted.
//!
//! The limiter is advisory. A 429 can still arrive and is handled by the
//! retry policy.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::HeaderMap;
use tracing::{debug, trace};

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Reset values below this are delta seconds rather than a unix timestamp.
const DELTA_RESET_THRESHOLD: i64 = 1_000_000_000;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(delta) = TimeDelta::from_std(by) {
            *self.now.lock().unwrap_or_else(|e| e.into_inner()) += delta;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Last quota snapshot reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Per-client quota tracker.
pub struct RateLimiter {
    state: Mutex<Option<RateLimitState>>,
    max_wait: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("state", &self.snapshot())
            .field("max_wait", &self.max_wait)
            .finish()
    }
}

impl RateLimiter {
    /// `max_wait` bounds the proactive wait; zero disables it.
    pub fn new(max_wait: Duration) -> Self {
        Self::with_clock(max_wait, Arc::new(SystemClock))
    }

    pub fn with_clock(max_wait: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(None),
            max_wait,
            clock,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn snapshot(&self) -> Option<RateLimitState> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the state outright.
    pub fn seed(&self, state: RateLimitState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state);
    }

    /// Record quota headers from a response. Returns `false` (state untouched)
    /// when the response carries none.
    pub fn observe(&self, headers: &HeaderMap) -> bool {
        let limit = header_u64(headers, HEADER_LIMIT);
        let remaining = header_u64(headers, HEADER_REMAINING);
        let reset = header_i64(headers, HEADER_RESET);
        if limit.is_none() && remaining.is_none() && reset.is_none() {
            return false;
        }

        let now = self.clock.now();
        let reset_at = reset.and_then(|value| {
            if value < DELTA_RESET_THRESHOLD {
                Some(now + TimeDelta::seconds(value.max(0)))
            } else {
                DateTime::from_timestamp(value, 0)
            }
        });

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let prior = *state;
        let next = RateLimitState {
            limit: limit.or(prior.map(|p| p.limit)).or(remaining).unwrap_or(0),
            remaining: remaining
                .or(prior.map(|p| p.remaining))
                .or(limit)
                .unwrap_or(0),
            reset_at: reset_at.or(prior.map(|p| p.reset_at)).unwrap_or(now),
        };
        trace!(
            limit = next.limit,
            remaining = next.remaining,
            reset_at = %next.reset_at,
            "rate limit observed"
        );
        *state = Some(next);
        true
    }

    /// How long to hold off before the next request, if at all.
    pub fn wait_time(&self) -> Option<Duration> {
        if self.max_wait.is_zero() {
            return None;
        }
        let state = self.snapshot()?;
        let now = self.clock.now();
        if state.remaining > 0 || now >= state.reset_at {
            return None;
        }
        let until_reset = (state.reset_at - now).to_std().ok()?;
        let wait = until_reset.min(self.max_wait);
        if until_reset > self.max_wait {
            debug!(
                until_reset_ms = until_reset.as_millis() as u64,
                max_wait_ms = self.max_wait.as_millis() as u64,
                "quota reset beyond max wait, waiting the bounded time"
            );
        }
        Some(wait)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    let raw = header_str(headers, name)?;
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.ceil() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn limiter(max_wait: Duration) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        (RateLimiter::with_clock(max_wait, clock.clone()), clock)
    }

    fn quota(remaining: &str, reset: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_LIMIT, HeaderValue::from_static("100"));
        headers.insert(HEADER_REMAINING, HeaderValue::from_str(remaining).unwrap());
        headers.insert(HEADER_RESET, HeaderValue::from_str(reset).unwrap());
        headers
    }

    #[test]
    fn no_state_means_no_wait() {
        let (limiter, _) = limiter(Duration::from_secs(30));
        assert!(limiter.wait_time().is_none());
    }

    #[test]
    fn exhausted_quota_waits_until_reset() {
        let (limiter, clock) = limiter(Duration::from_secs(30));
        assert!(limiter.observe(&quota("0", "1700000005")));
        assert_eq!(limiter.wait_time(), Some(Duration::from_secs(5)));

        clock.advance(Duration::from_secs(3));
        assert_eq!(limiter.wait_time(), Some(Duration::from_secs(2)));

        clock.advance(Duration::from_secs(2));
        assert!(limiter.wait_time().is_none());
    }

    #[test]
    fn wait_is_bounded_by_max() {
        let (limiter, _) = limiter(Duration::from_secs(10));
        limiter.observe(&quota("0", "3600"));
        assert_eq!(limiter.wait_time(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn zero_max_wait_disables_throttling() {
        let (limiter, _) = limiter(Duration::ZERO);
        limiter.observe(&quota("0", "60"));
        assert!(limiter.wait_time().is_none());
    }

    #[test]
    fn delta_reset_is_relative_to_now() {
        let (limiter, _) = limiter(Duration::from_secs(30));
        limiter.observe(&quota("0", "12"));
        let state = limiter.snapshot().unwrap();
        assert_eq!(state.reset_at, start() + TimeDelta::seconds(12));
        assert_eq!(state.limit, 100);
    }

    #[test]
    fn remaining_quota_does_not_wait() {
        let (limiter, _) = limiter(Duration::from_secs(30));
        limiter.observe(&quota("3", "1700000060"));
        assert!(limiter.wait_time().is_none());
    }

    #[test]
    fn responses_without_quota_headers_leave_state_untouched() {
        let (limiter, _) = limiter(Duration::from_secs(30));
        limiter.observe(&quota("0", "1700000020"));
        let before = limiter.snapshot();

        let mut unrelated = HeaderMap::new();
        unrelated.insert("content-type", HeaderValue::from_static("application/json"));
        assert!(!limiter.observe(&unrelated));
        assert!(!limiter.observe(&HeaderMap::new()));

        assert_eq!(limiter.snapshot(), before);
        assert_eq!(limiter.wait_time(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn latest_response_wins() {
        let (limiter, _) = limiter(Duration::from_secs(30));
        limiter.observe(&quota("0", "1700000020"));
        limiter.observe(&quota("50", "1700000020"));
        assert_eq!(limiter.snapshot().unwrap().remaining, 50);
        assert!(limiter.wait_time().is_none());
    }
}
