//! CLI entry point for courier.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use courier_core::build_http_client;
use tracing::{debug, info};

mod app_config;
mod cli;
mod commands;
mod progress_ui;

use cli::{Args, Command};
use commands::CommandContext;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything succeeded.
    Success,
    /// The run finished but skipped some chapters.
    Partial,
    /// A fatal error stopped the run.
    Failure,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

async fn run() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = app_config::load_default_config()?;

    init_tracing(&args, loaded.config.verbose);
    debug!(?args, "CLI arguments parsed");
    debug!(
        config_path = ?loaded.path,
        loaded_from_file = loaded.loaded_from_file,
        "configuration loaded"
    );

    let ctx = CommandContext {
        client: build_http_client().context("Failed to build HTTP client")?,
        config: loaded.config,
        device_url: args.device_url.clone(),
        quiet: args.quiet,
    };

    match &args.command {
        Command::Check => commands::run_check_command(&ctx).await?,
        Command::Search { query } => commands::run_search_command(&ctx, query).await?,
        Command::Chapters { work_id } => commands::run_chapters_command(&ctx, work_id).await?,
        Command::Download {
            work_id,
            title,
            chapters,
            all,
        } => {
            let outcome =
                commands::run_download_command(&ctx, work_id, title, chapters, *all).await?;
            info!(?outcome, "download finished");
            return Ok(outcome);
        }
    }
    Ok(ProcessExit::Success)
}

/// Priority: `RUST_LOG` > quiet flag > verbose flag > config `verbose` > info.
fn init_tracing(args: &Args, config_verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level(args, config_verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_level(args: &Args, config_verbose: bool) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 if config_verbose => "debug",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
