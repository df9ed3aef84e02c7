//! CLI command handlers.

mod chapters;
mod check;
mod download;
mod search;

pub use chapters::run_chapters_command;
pub use check::run_check_command;
pub use download::run_download_command;
pub use search::run_search_command;

use std::sync::Arc;

use anyhow::{Context, Result};
use courier_core::{DeviceClient, MangaDexProvider};
use reqwest::Client;

use crate::app_config::{AppConfig, normalize_device_url};

/// Shared state for one CLI invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Shared HTTP client.
    pub client: Client,
    /// Effective configuration.
    pub config: AppConfig,
    /// `--device-url` override.
    pub device_url: Option<String>,
    /// `-q` was given.
    pub quiet: bool,
}

impl CommandContext {
    /// Builds the catalog provider.
    pub fn provider(&self) -> Arc<MangaDexProvider> {
        Arc::new(MangaDexProvider::new(
            self.client.clone(),
            self.config.mangadex_api_key(),
        ))
    }

    /// Builds the device client from the override or the config.
    pub fn device(&self) -> Result<DeviceClient> {
        let base_url = match self.device_url.as_deref() {
            Some(raw) => normalize_device_url(
                raw,
                self.config
                    .device_port
                    .unwrap_or(crate::app_config::DEFAULT_DEVICE_PORT),
            )
            .context("Invalid --device-url")?,
            None => self.config.device_base_url()?,
        };
        Ok(DeviceClient::new(self.client.clone(), base_url))
    }
}
