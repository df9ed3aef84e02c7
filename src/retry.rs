//! Bounded retry with quadratic backoff for episode detail resolution.
//!
//! When a resolution attempt fails, the error is classified into a
//! [`FailureType`]; the [`RetryPolicy`] then decides whether another attempt
//! is allowed and how long to wait first. Waits are bound to the caller's
//! [`CallScope`]: they never run past the deadline and end immediately on
//! cancellation.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use courier_core::retry::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(FailureType::RateLimited, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_millis(250));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { .. } => unreachable!(),
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use crate::catalog::CatalogError;
use crate::scope::CallScope;

/// Default maximum attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff unit; the wait after attempt `n` is `n² × unit`.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_millis(250);

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    ///
    /// Network errors, 5xx statuses, undecodable bodies, missing metadata.
    Transient,

    /// Server rate limiting (HTTP 429).
    RateLimited,

    /// Failure that will not change on retry.
    ///
    /// Other 4xx statuses, cancellation, deadline expiry, empty manifests.
    Permanent,
}

/// Decision on whether to make another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// The upcoming attempt number (1-indexed, so the first retry is 2).
        attempt: u32,
    },

    /// Stop and surface the last error.
    DoNotRetry {
        /// Human-readable reason, for logs.
        reason: String,
    },
}

/// How a backoff wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffOutcome {
    /// Waited the full delay.
    Waited,
    /// Skipped because the deadline would pass first; the next attempt will
    /// fail against the deadline.
    DeadlineTooClose,
    /// The scope was cancelled during (or before) the wait.
    Cancelled,
}

/// Retry configuration.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `backoff_unit`: 250ms
///
/// # Delay Calculation
///
/// ```text
/// delay after attempt n = n² × backoff_unit
/// ```
///
/// With defaults the waits are 250ms then 1s. There is no jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the wait that follows a failure of `attempt` (1-indexed).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(attempt.saturating_mul(attempt))
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed with `failure_type`.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.backoff_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }
}

/// Waits `delay` inside `scope`.
///
/// If less than `delay` remains before the scope's deadline the wait is
/// skipped entirely.
pub async fn wait_backoff(scope: &CallScope, delay: Duration) -> BackoffOutcome {
    if scope.is_cancelled() {
        return BackoffOutcome::Cancelled;
    }
    if let Some(remaining) = scope.remaining()
        && remaining < delay
    {
        debug!(
            remaining_ms = remaining.as_millis(),
            delay_ms = delay.as_millis(),
            "deadline too close for backoff; skipping wait"
        );
        return BackoffOutcome::DeadlineTooClose;
    }

    if scope.sleep(delay).await {
        BackoffOutcome::Waited
    } else {
        BackoffOutcome::Cancelled
    }
}

/// Classifies a catalog error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Network | Transient |
/// | HTTP 429 | RateLimited |
/// | HTTP 5xx | Transient |
/// | Other HTTP status | Permanent |
/// | Decode | Transient |
/// | MetadataMissing | Transient |
/// | NoPages, EmptyPage, InvalidUrl | Permanent |
/// | Deadline, Cancelled | Permanent |
#[must_use]
pub fn classify_error(error: &CatalogError) -> FailureType {
    match error {
        CatalogError::HttpStatus { status, .. } => classify_http_status(*status),
        CatalogError::Network { .. }
        | CatalogError::Decode { .. }
        | CatalogError::MetadataMissing { .. } => FailureType::Transient,
        CatalogError::NoPages { .. }
        | CatalogError::EmptyPage { .. }
        | CatalogError::InvalidUrl { .. }
        | CatalogError::DeadlineExceeded { .. }
        | CatalogError::Cancelled { .. } => FailureType::Permanent,
    }
}

/// Classifies an HTTP status: 429 is rate limiting, any 5xx is transient,
/// everything else is permanent.
#[must_use]
pub fn classify_http_status(status: u16) -> FailureType {
    match status {
        429 => FailureType::RateLimited,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}
