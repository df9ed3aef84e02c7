//! Progress protocol between a pipeline run and its consumer.
//!
//! One producer (the run) and one consumer (the presentation layer) share a
//! bounded channel. The producer emits exactly one `done = true` update and
//! then drops its sender, which closes the stream.

use tokio::sync::mpsc;
use tracing::debug;

/// Slack on top of one slot per episode.
const CHANNEL_SLACK: usize = 2;

/// One record in the progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Steps completed so far.
    pub current: usize,
    /// Steps in the whole run.
    pub total: usize,
    /// Human-readable status line.
    pub message: String,
    /// True only on the final update of a run.
    pub done: bool,
    /// Terminal error text, set only when `done` is true.
    pub error: Option<String>,
}

impl ProgressUpdate {
    /// Completed fraction in `0.0..=1.0`; `0.0` when there are no steps.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Creates the bounded progress channel for a run over `episode_count` episodes.
#[must_use]
pub fn progress_channel(
    episode_count: usize,
) -> (mpsc::Sender<ProgressUpdate>, mpsc::Receiver<ProgressUpdate>) {
    mpsc::channel(episode_count + CHANNEL_SLACK)
}

/// Step counter that publishes every change to the progress stream.
///
/// `current` never decreases and never exceeds `total`. A consumer that has
/// gone away is ignored; the run keeps going.
#[derive(Debug)]
pub struct ProgressTracker {
    sender: Option<mpsc::Sender<ProgressUpdate>>,
    current: usize,
    total: usize,
}

impl ProgressTracker {
    /// Creates a tracker publishing to `sender`.
    #[must_use]
    pub fn new(sender: mpsc::Sender<ProgressUpdate>, total: usize) -> Self {
        Self {
            sender: Some(sender),
            current: 0,
            total,
        }
    }

    /// Creates a tracker with no consumer.
    #[must_use]
    pub fn detached(total: usize) -> Self {
        Self {
            sender: None,
            current: 0,
            total,
        }
    }

    /// Steps completed so far.
    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Steps in the run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Publishes `message` without advancing.
    pub async fn message(&self, message: impl Into<String>) {
        self.publish(message.into(), false, None).await;
    }

    /// Advances one step and publishes `message`.
    pub async fn advance(&mut self, message: impl Into<String>) {
        if self.current < self.total {
            self.current += 1;
        }
        self.publish(message.into(), false, None).await;
    }

    /// Advances up to `steps` steps and publishes `message`.
    pub async fn skip(&mut self, steps: usize, message: impl Into<String>) {
        self.current = self.current.saturating_add(steps).min(self.total);
        self.publish(message.into(), false, None).await;
    }

    /// Publishes the single terminal update and closes the stream.
    ///
    /// A run that was not aborted reports `current = total`.
    pub async fn finish(mut self, message: impl Into<String>, error: Option<String>, aborted: bool) {
        if !aborted {
            self.current = self.total;
        }
        self.publish(message.into(), true, error).await;
        self.sender = None;
    }

    async fn publish(&self, message: String, done: bool, error: Option<String>) {
        let Some(sender) = &self.sender else {
            return;
        };
        let update = ProgressUpdate {
            current: self.current,
            total: self.total,
            message,
            done,
            error,
        };
        if sender.send(update).await.is_err() {
            debug!("progress consumer gone; dropping update");
        }
    }
}
