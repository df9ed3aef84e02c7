//! Download command handler: run the pipeline for selected chapters.

use std::collections::HashSet;
use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use courier_core::scope::LISTING_TIMEOUT;
use courier_core::{
    CallScope, CatalogProvider, Episode, Pipeline, PipelineError, progress_channel,
    spawn_pipeline,
};
use tracing::{debug, error, info, warn};

use super::CommandContext;
use crate::ProcessExit;
use crate::progress_ui::render_progress;

pub async fn run_download_command(
    ctx: &CommandContext,
    work_id: &str,
    title: &str,
    chapters: &[String],
    all: bool,
) -> Result<ProcessExit> {
    let device = ctx.device()?;
    let provider = ctx.provider();

    let listing_scope = CallScope::with_timeout(LISTING_TIMEOUT);
    let directory = provider
        .list_episodes(work_id, &listing_scope)
        .await
        .with_context(|| format!("Listing chapters for {work_id} failed"))?;
    let selected = select_episodes(directory, chapters, all)?;
    info!(work = %title, episodes = selected.len(), "starting download");

    let run_scope = CallScope::new();
    let interrupt_scope = run_scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            interrupt_scope.cancel();
        }
    });

    let pipeline = Pipeline::new(provider, Arc::new(device));
    let (sender, receiver) = progress_channel(selected.len());
    let handle = spawn_pipeline(
        pipeline,
        title.to_string(),
        selected,
        sender,
        run_scope,
    );

    let show_bar = io::stderr().is_terminal() && !ctx.quiet;
    let outcome = render_progress(receiver, show_bar).await;
    if !outcome.finished {
        warn!(updates = outcome.updates, "progress stream closed without a final update");
    } else if let Some(error) = &outcome.error {
        debug!(updates = outcome.updates, %error, "run ended with an error");
    }

    let result = handle.await.context("Pipeline task panicked")?;
    Ok(match result {
        Ok(report) => {
            println!("Uploaded {} chapter(s).", report.uploaded.len());
            ProcessExit::Success
        }
        Err(PipelineError::EpisodesSkipped(summary)) => {
            println!("Uploaded {} chapter(s).", summary.uploaded.len());
            for skipped in &summary.skipped {
                warn!(episode_id = %skipped.episode_id, label = %skipped.label, error = %skipped.error, "skipped");
            }
            eprintln!("{summary}");
            ProcessExit::Partial
        }
        Err(err) => {
            error!(error = %err, "download failed");
            eprintln!("error: {err}");
            ProcessExit::Failure
        }
    })
}

/// Picks episodes by display number, or all of them.
///
/// Requested numbers missing from the directory are reported and ignored.
pub fn select_episodes(
    directory: Vec<Episode>,
    chapters: &[String],
    all: bool,
) -> Result<Vec<Episode>> {
    if all {
        if directory.is_empty() {
            bail!("The work has no downloadable chapters");
        }
        return Ok(directory);
    }
    if chapters.is_empty() {
        bail!("Nothing selected: pass --chapter <NUMBER> or --all");
    }

    let wanted: HashSet<&str> = chapters.iter().map(|c| c.trim()).collect();
    let selected: Vec<Episode> = directory
        .into_iter()
        .filter(|episode| wanted.contains(episode.number.as_str()))
        .collect();

    let found: HashSet<&str> = selected.iter().map(|e| e.number.as_str()).collect();
    for missing in wanted.difference(&found) {
        warn!(chapter = %missing, "chapter not found in directory");
    }
    if selected.is_empty() {
        bail!("None of the requested chapters are available");
    }
    Ok(selected)
}
