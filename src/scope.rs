//! Cancellable, deadline-bound scopes for outbound calls.
//!
//! Every network call made by the catalog provider or the device client runs
//! inside a [`CallScope`]. A scope carries an optional deadline and a
//! [`CancellationToken`]; child scopes inherit both, so cancelling a batch run
//! aborts whatever request or backoff wait is currently in flight.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Deadline for device connectivity checks.
pub const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for catalog searches and cover fetches.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Deadline for a full episode directory listing (all pages).
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for a single device call (folder creation, upload).
pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for fetching one episode: detail resolution plus every page.
pub const EPISODE_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Why a scoped call ended without producing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeExit {
    /// The scope (or one of its parents) was cancelled.
    Cancelled,
    /// The scope's deadline passed.
    DeadlineExceeded,
}

/// A cancellable execution scope with an optional deadline.
#[derive(Debug, Clone)]
pub struct CallScope {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Default for CallScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CallScope {
    /// Creates a root scope with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a root scope that expires after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a root scope driven by an existing cancellation token.
    #[must_use]
    pub fn from_token(cancel: CancellationToken) -> Self {
        Self {
            deadline: None,
            cancel,
        }
    }

    /// Derives a child scope that expires after `timeout`, or at the parent's
    /// deadline if that comes first. Cancelling the parent cancels the child.
    #[must_use]
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => parent.min(own),
            None => own,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.child_token(),
        }
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when the scope has no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Cancels this scope and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the underlying cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drives `future` to completion unless the scope is cancelled or its
    /// deadline passes first.
    ///
    /// Cancellation is checked before the deadline, and both before the
    /// future, so an already-expired scope fails without polling `future`.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeExit`] describing why the future was abandoned.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, ScopeExit>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ScopeExit::Cancelled),
            () = wait_for_deadline(self.deadline) => Err(ScopeExit::DeadlineExceeded),
            output = future => Ok(output),
        }
    }

    /// Sleeps for `delay`, returning early if the scope is cancelled.
    ///
    /// Returns `false` when the sleep was interrupted by cancellation.
    pub async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_output_when_future_completes() {
        let scope = CallScope::with_timeout(Duration::from_secs(5));
        let value = scope.run(async { 42 }).await;
        assert_eq!(value, Ok(42));
    }

    #[tokio::test]
    async fn test_run_reports_cancellation() {
        let scope = CallScope::new();
        scope.cancel();
        let result = scope.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(ScopeExit::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_deadline() {
        let scope = CallScope::with_timeout(Duration::from_millis(100));
        let result = scope.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(ScopeExit::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_scope_fails_before_polling_ready_future() {
        let scope = CallScope::with_timeout(Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;
        let result = scope.run(async { "ready" }).await;
        assert_eq!(result, Err(ScopeExit::DeadlineExceeded));
    }

    #[test]
    fn test_child_deadline_never_outlives_parent() {
        let parent = CallScope::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert!(child.deadline().unwrap() <= parent.deadline().unwrap());
    }

    #[test]
    fn test_child_inherits_cancellation() {
        let parent = CallScope::new();
        let child = parent.child_with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_remaining_is_none_without_deadline() {
        assert!(CallScope::new().remaining().is_none());
    }

    #[tokio::test]
    async fn test_sleep_returns_false_when_cancelled() {
        let scope = CallScope::new();
        let waiter = scope.clone();
        let handle = tokio::spawn(async move { waiter.sleep(Duration::from_secs(60)).await });
        scope.cancel();
        assert!(!handle.await.unwrap());
    }
}
