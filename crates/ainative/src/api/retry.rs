//! Retry decisions with exponential backoff and jitter.
//!
//! Retries transient outcomes (network failures, timeouts, 429, 500, 502,
//! 503, 504) up to a fixed attempt budget. Never retries 400, 401, 403, 404,
//! 409, or 422. Operations that are not retry-safe (non-idempotent with no
//! idempotency key) are only re-issued when the transport failed before any
//! response arrived.
//!
//! A 429 carrying `Retry-After` sleeps for the server's hint instead of the
//! computed backoff, capped at [`RetryConfig::max_retry_after`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::api::request::OperationDescriptor;
use crate::api::transport::AttemptOutcome;

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Sleep for the given delay, then issue another attempt.
    Retry(Duration),
    /// Hand the outcome to the response mapper.
    GiveUp,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first (1 = never retry).
    pub max_attempts: u32,
    /// Delay before the second attempt, before jitter.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Backoff multiplier (2.0 doubles the delay each attempt).
    pub multiplier: f64,
    /// Scale each delay by a random factor in `[0.5, 1.5)`.
    pub jitter: bool,
    /// Upper bound on a `Retry-After` sleep; longer hints are cut to this.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
            max_retry_after: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Create a config with the given attempt budget. Uses sensible defaults.
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            ..Default::default()
        }
    }

    /// A config that never retries.
    pub fn disabled() -> Self {
        Self::with_attempts(1)
    }

    /// Un-jittered delay after the 1-based `attempt`, capped at `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let raw = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Delay after the 1-based `attempt`, with jitter when enabled.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..1.5);
            self.delay_with_factor(attempt, factor)
        } else {
            self.base_delay(attempt)
        }
    }

    /// Delay for a given jitter factor, clamped to `max_delay`.
    pub fn delay_with_factor(&self, attempt: u32, factor: f64) -> Duration {
        let secs = self.base_delay(attempt).as_secs_f64() * factor.max(0.0);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs.min(self.max_delay.as_secs_f64())).unwrap_or(self.max_delay)
    }

    /// Attempt budget for `op`, honoring its override.
    pub fn attempts_for(&self, op: &OperationDescriptor) -> u32 {
        op.max_attempts.unwrap_or(self.max_attempts).max(1)
    }

    /// Decide what follows the 1-based `attempt` of `op`.
    pub fn decide(&self, outcome: &AttemptOutcome, attempt: u32, op: &OperationDescriptor) -> Decision {
        self.decide_at(outcome, attempt, op, Utc::now())
    }

    /// [`decide`](Self::decide) with an explicit clock reading, for HTTP-date
    /// `Retry-After` values.
    pub fn decide_at(
        &self,
        outcome: &AttemptOutcome,
        attempt: u32,
        op: &OperationDescriptor,
        now: DateTime<Utc>,
    ) -> Decision {
        if attempt >= self.attempts_for(op) {
            return Decision::GiveUp;
        }

        match outcome {
            AttemptOutcome::Success(_) => Decision::GiveUp,
            AttemptOutcome::TransportFailure(failure) => {
                if failure.response_started && !op.is_retry_safe() {
                    Decision::GiveUp
                } else {
                    Decision::Retry(self.delay_for_attempt(attempt))
                }
            }
            AttemptOutcome::HttpFailure(response) => {
                if !is_transient_status(response.status) || !op.is_retry_safe() {
                    return Decision::GiveUp;
                }
                if response.status == 429
                    && let Some(hint) = retry_after_hint(&response.headers, now)
                {
                    return Decision::Retry(hint.min(self.max_retry_after));
                }
                Decision::Retry(self.delay_for_attempt(attempt))
            }
        }
    }
}

/// Statuses worth retrying.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Statuses that are terminal regardless of attempt count.
pub fn is_permanent_status(status: u16) -> bool {
    matches!(status, 400 | 401 | 403 | 404 | 409 | 422)
}

/// The `Retry-After` header as a delay, if present and parsable.
pub fn retry_after_hint(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, now))
}

/// Parse delta-seconds or an HTTP date. Dates in the past yield zero;
/// values too large for a `Duration` yield `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = value.parse::<f64>()
        && secs.is_finite()
        && secs >= 0.0
    {
        return Duration::try_from_secs_f64(secs).ok();
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
