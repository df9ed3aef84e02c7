//! Error types for pipeline runs.

use std::fmt;

use thiserror::Error;

use crate::archive::PackageError;
use crate::catalog::CatalogError;
use crate::device::DeviceError;

/// One episode left out of a run, with its classified reason.
#[derive(Debug)]
pub struct SkippedEpisode {
    /// Episode identifier.
    pub episode_id: String,
    /// Display label.
    pub label: String,
    /// Skip-classified error (metadata missing or no pages).
    pub error: CatalogError,
}

/// Outcome of a run that finished every episode but skipped some.
#[derive(Debug, Default)]
pub struct SkipSummary {
    /// File names uploaded before and after the skips.
    pub uploaded: Vec<String>,
    /// Episodes that were skipped, in run order.
    pub skipped: Vec<SkippedEpisode>,
}

impl fmt::Display for SkipSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped {} episode(s): ", self.skipped.len())?;
        for (i, episode) in self.skipped.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", episode.error)?;
        }
        Ok(())
    }
}

/// Errors that end a pipeline run.
///
/// Every variant except [`PipelineError::EpisodesSkipped`] aborts the batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The run was started with an empty batch.
    #[error("no episodes selected")]
    NoEpisodes,

    /// Detail resolution or page download failed with a non-skip error.
    #[error("error downloading {episode}: {source}")]
    Download {
        /// Episode label.
        episode: String,
        /// Underlying catalog error.
        #[source]
        source: CatalogError,
    },

    /// Archive packaging failed.
    #[error("error creating CBZ for {episode}: {source}")]
    Package {
        /// Episode label.
        episode: String,
        /// Underlying packaging error.
        #[source]
        source: PackageError,
    },

    /// The device rejected or failed an upload.
    #[error("error uploading {episode}: {source}")]
    Upload {
        /// Episode label.
        episode: String,
        /// Underlying device error.
        #[source]
        source: DeviceError,
    },

    /// Every episode was processed, but some were skipped.
    #[error("{0}")]
    EpisodesSkipped(SkipSummary),

    /// The run's scope was cancelled.
    #[error("run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// True for errors that halted the batch before its end.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::EpisodesSkipped(_))
    }
}
