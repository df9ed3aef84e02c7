//! Search command handler: find works by title.

use anyhow::{Context, Result};
use courier_core::scope::SEARCH_TIMEOUT;
use courier_core::{CallScope, CatalogProvider};

use super::CommandContext;

pub async fn run_search_command(ctx: &CommandContext, query: &str) -> Result<()> {
    let provider = ctx.provider();
    let scope = CallScope::with_timeout(SEARCH_TIMEOUT);
    let results = provider
        .search(query, &scope)
        .await
        .with_context(|| format!("Search for '{query}' failed"))?;

    if results.is_empty() {
        println!("No results for '{query}'.");
        return Ok(());
    }
    for result in &results {
        println!("{}\t{}\t{}", result.id, result.title, result.cover_url);
    }
    Ok(())
}
