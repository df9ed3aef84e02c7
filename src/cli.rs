//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};

/// Fetch illustrated chapters and deliver them to a networked e-reader.
///
/// Courier lists a work's chapters from the catalog, packages each chapter
/// as a CBZ archive, and uploads it into a folder on the device.
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Device base URL or address (overrides config)
    #[arg(long, global = true, value_name = "URL")]
    pub device_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Check that the device is reachable
    Check,

    /// Search the catalog by title
    Search {
        /// Title to search for
        query: String,
    },

    /// List a work's chapters in reading order
    Chapters {
        /// Work identifier from `search`
        work_id: String,
    },

    /// Download chapters, package them as CBZ and upload them to the device
    Download {
        /// Work identifier from `search`
        work_id: String,

        /// Work title, used as the device folder name
        #[arg(long)]
        title: String,

        /// Chapter number to include (repeatable)
        #[arg(long = "chapter", value_name = "NUMBER")]
        chapters: Vec<String>,

        /// Include every chapter
        #[arg(long, conflicts_with = "chapters")]
        all: bool,
    },
}
