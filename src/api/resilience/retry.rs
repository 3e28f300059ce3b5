//! Retry policies with classified outcomes
//!
//! The policy is a pure function of (outcome, attempt index, config). It never
//! sleeps and never performs I/O; the executor acts on the returned decision.

use crate::api::error::ApiError;
use crate::api::transport::{HttpResponse, TransportFailure};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How long to wait before the next attempt for one class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry. `Duration::ZERO` retries immediately.
    Fixed {
        #[serde(with = "duration_secs")]
        delay: Duration,
    },
    /// `base_delay * multiplier ^ attempt_index`, capped at `max_delay`.
    Exponential {
        #[serde(with = "duration_secs")]
        base_delay: Duration,
        multiplier: f64,
        #[serde(with = "duration_secs")]
        max_delay: Duration,
    },
}

impl Backoff {
    pub const fn fixed(delay: Duration) -> Self {
        Backoff::Fixed { delay }
    }

    pub const fn immediate() -> Self {
        Backoff::Fixed { delay: Duration::ZERO }
    }

    pub const fn exponential(base_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Backoff::Exponential {
            base_delay,
            multiplier,
            max_delay,
        }
    }

    /// Delay before the retry that follows attempt `attempt_index` (0-based).
    pub fn delay(&self, attempt_index: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay } => delay,
            Backoff::Exponential {
                base_delay,
                multiplier,
                max_delay,
            } => {
                let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
                let seconds = base_delay.as_secs_f64() * multiplier.powi(exponent);
                if !seconds.is_finite() || seconds >= max_delay.as_secs_f64() {
                    max_delay
                } else {
                    Duration::from_secs_f64(seconds.max(0.0))
                }
            }
        }
    }
}

/// Retry configuration for one upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first one.
    pub max_attempts: u32,
    /// Used for 429 when the server gives no usable `Retry-After`.
    pub rate_limit: Backoff,
    pub server_error: Backoff,
    /// Wait after a 401/403 before re-authenticating and retrying.
    pub auth: Backoff,
    pub transport: Backoff,
    /// When set, 204 means "processing, not ready yet" and is retried.
    pub processing: Option<Backoff>,
    pub honor_retry_after: bool,
    /// Randomise waits to 50%-150% of the computed value.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let exponential = Backoff::exponential(Duration::from_millis(500), 2.0, Duration::from_secs(30));
        Self {
            max_attempts: 3,
            rate_limit: exponential,
            server_error: exponential,
            auth: Backoff::immediate(),
            transport: exponential,
            processing: None,
            honor_retry_after: true,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Conservative config for production
    pub fn conservative() -> Self {
        let exponential = Backoff::exponential(Duration::from_secs(1), 1.5, Duration::from_secs(10));
        Self {
            max_attempts: 2,
            rate_limit: exponential,
            server_error: exponential,
            transport: exponential,
            jitter: true,
            ..Self::default()
        }
    }

    /// Aggressive config for development/testing
    pub fn aggressive() -> Self {
        let exponential = Backoff::exponential(Duration::from_millis(200), 2.5, Duration::from_secs(60));
        Self {
            max_attempts: 5,
            rate_limit: exponential,
            server_error: exponential,
            transport: exponential,
            jitter: true,
            ..Self::default()
        }
    }

    /// Same exponential schedule for every retryable class.
    pub fn exponential(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        let backoff = Backoff::exponential(base_delay, multiplier, Duration::from_secs(3600));
        Self {
            max_attempts,
            rate_limit: backoff,
            server_error: backoff,
            auth: Backoff::immediate(),
            transport: backoff,
            processing: None,
            honor_retry_after: true,
            jitter: false,
        }
    }

    /// Single attempt, nothing is retried.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Why an attempt is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    RateLimited,
    ServerError,
    Auth,
    Transport,
    Processing,
}

impl RetryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::RateLimited => "rate_limited",
            RetryReason::ServerError => "server_error",
            RetryReason::Auth => "auth",
            RetryReason::Transport => "transport",
            RetryReason::Processing => "processing",
        }
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one attempt produced.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Response(&'a HttpResponse),
    Transport(&'a TransportFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Success,
    Retry,
    Fail,
}

/// Decision derived from one outcome. Plain data, no hidden state.
#[derive(Debug, Clone)]
pub struct RetryDecision {
    pub action: RetryAction,
    pub wait: Duration,
    pub reason: Option<RetryReason>,
    /// The classified error for anything that is not a success.
    pub error: Option<ApiError>,
    /// Set on 401/403: the cached credential must be dropped before the next attempt.
    pub invalidate_credentials: bool,
}

impl RetryDecision {
    fn success() -> Self {
        Self {
            action: RetryAction::Success,
            wait: Duration::ZERO,
            reason: None,
            error: None,
            invalidate_credentials: false,
        }
    }

    fn fail(error: ApiError) -> Self {
        Self {
            action: RetryAction::Fail,
            wait: Duration::ZERO,
            reason: None,
            error: Some(error),
            invalidate_credentials: false,
        }
    }

    pub fn is_retry(&self) -> bool {
        self.action == RetryAction::Retry
    }
}

/// Retry policy evaluating outcomes against a [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Classify the outcome of attempt `attempt_index` (0-based).
    pub fn decide(&self, outcome: &Outcome<'_>, attempt_index: u32) -> RetryDecision {
        let (reason, wait, error) = match outcome {
            Outcome::Transport(failure) => (
                RetryReason::Transport,
                self.config.transport.delay(attempt_index),
                ApiError::Transport(failure.to_string()),
            ),
            Outcome::Response(response) => {
                let status = response.status;
                match status {
                    204 => match self.config.processing {
                        Some(backoff) => (RetryReason::Processing, backoff.delay(attempt_index), ApiError::Processing),
                        None => return RetryDecision::success(),
                    },
                    200..=299 => return RetryDecision::success(),
                    429 => {
                        let retry_after = parse_retry_after(response);
                        let wait = match retry_after {
                            Some(server_wait) if self.config.honor_retry_after => server_wait,
                            _ => self.config.rate_limit.delay(attempt_index),
                        };
                        (
                            RetryReason::RateLimited,
                            wait,
                            ApiError::from_status(status, response.body.clone(), retry_after),
                        )
                    }
                    401 | 403 => (
                        RetryReason::Auth,
                        self.config.auth.delay(attempt_index),
                        ApiError::from_status(status, response.body.clone(), None),
                    ),
                    500..=599 => (
                        RetryReason::ServerError,
                        self.config.server_error.delay(attempt_index),
                        ApiError::from_status(status, response.body.clone(), None),
                    ),
                    _ => return RetryDecision::fail(ApiError::from_status(status, response.body.clone(), None)),
                }
            }
        };

        let invalidate_credentials = reason == RetryReason::Auth;

        if attempt_index.saturating_add(1) >= self.max_attempts() {
            return RetryDecision {
                action: RetryAction::Fail,
                wait: Duration::ZERO,
                reason: Some(reason),
                error: Some(ApiError::ExhaustedRetries {
                    attempts: self.max_attempts(),
                    last_error: Some(Box::new(error)),
                }),
                invalidate_credentials,
            };
        }

        // Server-supplied waits are never jittered.
        let server_dictated = reason == RetryReason::RateLimited
            && self.config.honor_retry_after
            && matches!(outcome, Outcome::Response(r) if parse_retry_after(r).is_some());
        let wait = if self.config.jitter && !server_dictated {
            apply_jitter(wait)
        } else {
            wait
        };

        RetryDecision {
            action: RetryAction::Retry,
            wait,
            reason: Some(reason),
            error: Some(error),
            invalidate_credentials,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// `Retry-After` in whole seconds; anything else (dates, zero, garbage) is ignored.
pub fn parse_retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
}

fn apply_jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let factor = rand::rng().random_range(0.5..=1.5);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(seconds))
    }
}
