//! Chapters command handler: print a work's directory.

use anyhow::{Context, Result};
use courier_core::scope::LISTING_TIMEOUT;
use courier_core::{CallScope, CatalogProvider};

use super::CommandContext;

pub async fn run_chapters_command(ctx: &CommandContext, work_id: &str) -> Result<()> {
    let provider = ctx.provider();
    let scope = CallScope::with_timeout(LISTING_TIMEOUT);
    let episodes = provider
        .list_episodes(work_id, &scope)
        .await
        .with_context(|| format!("Listing chapters for {work_id} failed"))?;

    if episodes.is_empty() {
        println!("No downloadable chapters for {work_id}.");
        return Ok(());
    }
    for episode in &episodes {
        println!("{}\t{}", episode.number, episode.label());
    }
    Ok(())
}
