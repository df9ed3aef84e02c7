//! Catalog sources: where episodes and their page images come from.
//!
//! # Architecture
//!
//! - [`CatalogProvider`] - Async trait every catalog source implements
//! - [`MangaDexProvider`] - The native source: paged directory, retried
//!   detail resolution, ordered page download
//! - [`Episode`], [`EpisodeDetail`], [`PageImage`] - Data carried between stages
//! - [`CatalogError`] - Error taxonomy, including the skip-classified kinds
//!
//! The pipeline depends only on the trait, so alternate sources can be
//! dropped in without touching orchestration.

mod error;
pub mod mangadex;

pub use error::{CatalogError, ErrorKind};
pub use mangadex::MangaDexProvider;

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::scope::CallScope;

/// One hit from a catalog search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Work identifier, passed to [`CatalogProvider::list_episodes`].
    pub id: String,
    /// Display title.
    pub title: String,
    /// Cover thumbnail URL, or empty when the work has no cover.
    pub cover_url: String,
}

/// One episode (chapter) of a work.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    /// Identifier, unique within a work.
    pub id: String,
    /// Display number exactly as the catalog reports it; may be non-numeric.
    pub number: String,
    /// Episode title, possibly empty.
    pub title: String,
    /// Volume label, possibly empty.
    pub volume: String,
    /// Numeric sort key parsed from `number`; `0.0` when unparseable.
    pub sort_key: f64,
}

impl Episode {
    /// Creates an episode, deriving its sort key from `number`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        number: impl Into<String>,
        title: impl Into<String>,
        volume: impl Into<String>,
    ) -> Self {
        let number = number.into();
        let sort_key = parse_sort_key(&number);
        Self {
            id: id.into(),
            number,
            title: title.into(),
            volume: volume.into(),
            sort_key,
        }
    }

    /// Human-readable label, e.g. `Volume 2, Chapter 11 - Homecoming`.
    #[must_use]
    pub fn label(&self) -> String {
        format_episode_label(&self.number, &self.title, &self.volume)
    }

    /// Directory order: sort key ascending, then volume label ascending.
    #[must_use]
    pub fn directory_cmp(&self, other: &Self) -> Ordering {
        self.sort_key
            .total_cmp(&other.sort_key)
            .then_with(|| self.volume.cmp(&other.volume))
    }
}

/// Parses a display number into a sort key. Unparseable numbers sort first.
#[must_use]
pub fn parse_sort_key(number: &str) -> f64 {
    number.trim().parse::<f64>().unwrap_or(0.0)
}

/// Formats an episode label from its parts.
#[must_use]
pub fn format_episode_label(number: &str, title: &str, volume: &str) -> String {
    let mut label = if number.is_empty() {
        "Chapter".to_string()
    } else {
        format!("Chapter {number}")
    };
    if !title.is_empty() {
        label = format!("{label} - {title}");
    }
    if !volume.is_empty() {
        label = format!("Volume {volume}, {label}");
    }
    label
}

/// Image quality tier a manifest belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Full-quality originals.
    Data,
    /// Reduced-quality fallback.
    DataSaver,
}

impl Quality {
    /// URL path segment for this tier.
    #[must_use]
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::DataSaver => "data-saver",
        }
    }
}

/// Delivery metadata needed to fetch one episode's pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeDetail {
    /// Episode this detail was resolved for.
    pub episode_id: String,
    /// Delivery host base URL.
    pub base_url: String,
    /// Content hash / access token.
    pub hash: String,
    /// Primary-quality page file names, in reading order.
    pub data: Vec<String>,
    /// Reduced-quality page file names, in reading order.
    pub data_saver: Vec<String>,
}

impl EpisodeDetail {
    /// True when both host and hash are present.
    #[must_use]
    pub fn has_delivery_target(&self) -> bool {
        !self.base_url.is_empty() && !self.hash.is_empty()
    }

    /// Picks the primary manifest, falling back to the reduced-quality one.
    ///
    /// Returns `None` when both are empty.
    #[must_use]
    pub fn manifest(&self) -> Option<(Quality, &[String])> {
        if !self.data.is_empty() {
            Some((Quality::Data, &self.data))
        } else if !self.data_saver.is_empty() {
            Some((Quality::DataSaver, &self.data_saver))
        } else {
            None
        }
    }
}

/// One downloaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 0-based position in the manifest; establishes archive order.
    pub index: usize,
    /// Raw image bytes; never empty.
    pub bytes: Vec<u8>,
}

/// Contract every catalog source implements.
///
/// # Object Safety
///
/// Uses `async_trait` so the pipeline can hold an `Arc<dyn CatalogProvider>`.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Returns the source's name (e.g. "mangadex").
    fn name(&self) -> &str;

    /// Searches works by title.
    async fn search(
        &self,
        query: &str,
        scope: &CallScope,
    ) -> Result<Vec<SearchResult>, CatalogError>;

    /// Lists every episode of a work, deduplicated and in directory order.
    async fn list_episodes(
        &self,
        work_id: &str,
        scope: &CallScope,
    ) -> Result<Vec<Episode>, CatalogError>;

    /// Resolves and downloads every page of one episode, in reading order.
    async fn fetch_episode_pages(
        &self,
        episode: &Episode,
        scope: &CallScope,
    ) -> Result<Vec<PageImage>, CatalogError>;

    /// Fetches a cover image.
    async fn fetch_cover(&self, cover_url: &str, scope: &CallScope)
    -> Result<Vec<u8>, CatalogError>;
}
