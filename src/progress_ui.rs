//! Progress bar for pipeline runs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;

use courier_core::ProgressUpdate;

/// Final state seen by the renderer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RenderOutcome {
    /// Number of updates received.
    pub updates: usize,
    /// Whether the terminal `done` update arrived.
    pub finished: bool,
    /// Terminal error text, if any.
    pub error: Option<String>,
}

/// Consumes the progress stream until it closes, drawing a bar unless hidden.
pub(crate) async fn render_progress(
    mut updates: mpsc::Receiver<ProgressUpdate>,
    visible: bool,
) -> RenderOutcome {
    let bar = ProgressBar::new(0);
    if visible {
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
    } else {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut outcome = RenderOutcome::default();
    while let Some(update) = updates.recv().await {
        outcome.updates += 1;
        if update.total > 0 {
            bar.set_length(update.total as u64);
        }
        bar.set_position(update.current as u64);
        bar.set_message(update.message.clone());
        if update.done {
            outcome.finished = true;
            outcome.error = update.error;
        }
    }

    bar.finish_and_clear();
    outcome
}
