//! Paged episode directory.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use super::wire::{EpisodeListResponse, EpisodeRecord};
use super::{MangaDexProvider, parse_url};
use crate::catalog::{CatalogError, Episode};
use crate::scope::CallScope;

/// Records requested per listing page.
pub(crate) const PAGE_SIZE: usize = 100;

const CONTENT_RATINGS: [&str; 3] = ["safe", "suggestive", "erotica"];

impl MangaDexProvider {
    /// Lists every native, non-empty episode of `work_id` in directory order.
    ///
    /// Pages are requested until one comes back short. Any page failure
    /// aborts the whole listing.
    #[instrument(skip(self, scope), fields(provider = "mangadex"))]
    pub(crate) async fn fetch_directory(
        &self,
        work_id: &str,
        scope: &CallScope,
    ) -> Result<Vec<Episode>, CatalogError> {
        let mut episodes = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0usize;
        let mut requests = 0u32;

        loop {
            let url = self.listing_url(work_id, offset)?;
            let body = self.get_ok_body(&url, scope).await?;
            requests += 1;
            let page: EpisodeListResponse =
                serde_json::from_slice(&body).map_err(|source| CatalogError::decode(&url, source))?;

            let received = page.data.len();
            collect_episodes(page.data, &mut seen, &mut episodes);
            debug!(offset, received, kept = episodes.len(), "listing page received");

            if received < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        episodes.sort_by(Episode::directory_cmp);
        info!(requests, episodes = episodes.len(), "episode directory built");
        Ok(episodes)
    }

    fn listing_url(&self, work_id: &str, offset: usize) -> Result<String, CatalogError> {
        let mut url = parse_url(&format!("{}/chapter", self.api_base))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("limit", &PAGE_SIZE.to_string())
                .append_pair("offset", &offset.to_string())
                .append_pair("manga", work_id);
            for rating in CONTENT_RATINGS {
                query.append_pair("contentRating[]", rating);
            }
            query
                .append_pair("includeFutureUpdates", "1")
                .append_pair("order[volume]", "asc")
                .append_pair("order[chapter]", "asc")
                .append_pair("translatedLanguage[]", "en");
        }
        Ok(url.into())
    }
}

/// Appends acceptable records to `out`, skipping externally hosted entries,
/// zero-page entries and ids already in `seen`.
pub(crate) fn collect_episodes(
    records: Vec<EpisodeRecord>,
    seen: &mut HashSet<String>,
    out: &mut Vec<Episode>,
) {
    for record in records {
        let attributes = record.attributes;
        let external = attributes
            .external_url
            .as_deref()
            .is_some_and(|url| !url.is_empty());
        if external || attributes.pages == 0 {
            continue;
        }
        if !seen.insert(record.id.clone()) {
            continue;
        }
        out.push(Episode::new(
            record.id,
            attributes.chapter.unwrap_or_default(),
            attributes.title.unwrap_or_default(),
            attributes.volume.unwrap_or_default(),
        ));
    }
}
