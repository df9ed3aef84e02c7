//! Check command handler: confirm the device answers.

use anyhow::{Context, Result};
use courier_core::CallScope;
use courier_core::scope::CONNECTIVITY_TIMEOUT;

use super::CommandContext;

pub async fn run_check_command(ctx: &CommandContext) -> Result<()> {
    let device = ctx.device()?;
    let scope = CallScope::with_timeout(CONNECTIVITY_TIMEOUT);
    let details = device
        .check_connection(&scope)
        .await
        .with_context(|| format!("Device at {} is not reachable", device.base_url()))?;

    println!("device = {}", device.base_url());
    println!("model = {}", details.model);
    println!("type = {}", details.device_type);
    println!(
        "storage = {} used of {}",
        details.storage_used, details.storage_total
    );
    Ok(())
}
