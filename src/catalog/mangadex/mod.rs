//! MangaDex catalog source.
//!
//! - [`MangaDexProvider::list_episodes`](super::CatalogProvider::list_episodes) -
//!   the episode directory (`directory.rs`)
//! - [`MangaDexProvider::resolve_detail`] - retried detail resolution (`detail.rs`)
//! - [`MangaDexProvider::download_pages`] - ordered page download (`pages.rs`)

mod detail;
mod directory;
mod pages;
mod wire;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, instrument};
use url::Url;

use super::{CatalogError, CatalogProvider, Episode, PageImage, SearchResult};
use crate::retry::RetryPolicy;
use crate::scope::CallScope;

use wire::{Relationship, SearchResponse};

/// Production API base.
pub const API_BASE_URL: &str = "https://api.mangadex.org";

/// Production cover host.
pub const UPLOADS_BASE_URL: &str = "https://uploads.mangadex.org";

const SEARCH_LIMIT: u32 = 20;

/// MangaDex implementation of [`CatalogProvider`].
#[derive(Debug, Clone)]
pub struct MangaDexProvider {
    client: Client,
    api_base: String,
    uploads_base: String,
    api_key: Option<String>,
    retry_policy: RetryPolicy,
}

impl MangaDexProvider {
    /// Creates a provider against the production endpoints.
    ///
    /// A blank `api_key` is treated as absent.
    #[must_use]
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Self {
            client,
            api_base: API_BASE_URL.to_string(),
            uploads_base: UPLOADS_BASE_URL.to_string(),
            api_key,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Overrides the API and cover hosts (used by tests and mirrors).
    #[must_use]
    pub fn with_endpoints(
        mut self,
        api_base: impl Into<String>,
        uploads_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.uploads_base = uploads_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the detail-resolution retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Builds a GET request carrying the provider's auth headers.
    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.api_key {
            Some(key) => request
                .bearer_auth(key)
                .header("X-Api-Key", key.as_str()),
            None => request,
        }
    }

    /// Sends `request` inside `scope`.
    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        scope: &CallScope,
    ) -> Result<Response, CatalogError> {
        scope
            .run(request.send())
            .await
            .map_err(|exit| CatalogError::from_scope(url, exit))?
            .map_err(|source| CatalogError::network(url, source))
    }

    /// Reads the full body inside `scope`.
    async fn read_body(
        response: Response,
        url: &str,
        scope: &CallScope,
    ) -> Result<Vec<u8>, CatalogError> {
        let bytes = scope
            .run(response.bytes())
            .await
            .map_err(|exit| CatalogError::from_scope(url, exit))?
            .map_err(|source| CatalogError::network(url, source))?;
        Ok(bytes.to_vec())
    }

    /// GET, require 200, return the body.
    async fn get_ok_body(&self, url: &str, scope: &CallScope) -> Result<Vec<u8>, CatalogError> {
        let response = self.send(self.get(url), url, scope).await?;
        let status = response.status();
        let body = Self::read_body(response, url, scope).await?;
        if !status.is_success() {
            return Err(CatalogError::http_status(
                url,
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }
        Ok(body)
    }

    fn cover_url(&self, work_id: &str, file_name: &str) -> String {
        if work_id.is_empty() || file_name.is_empty() {
            return String::new();
        }
        format!("{}/covers/{work_id}/{file_name}.256.jpg", self.uploads_base)
    }
}

#[async_trait]
impl CatalogProvider for MangaDexProvider {
    fn name(&self) -> &str {
        "mangadex"
    }

    #[instrument(skip(self, scope), fields(provider = "mangadex"))]
    async fn search(
        &self,
        query: &str,
        scope: &CallScope,
    ) -> Result<Vec<SearchResult>, CatalogError> {
        let mut url = parse_url(&format!("{}/manga", self.api_base))?;
        url.query_pairs_mut()
            .append_pair("title", query)
            .append_pair("limit", &SEARCH_LIMIT.to_string())
            .append_pair("includes[]", "cover_art");

        let body = self.get_ok_body(url.as_str(), scope).await?;
        let response: SearchResponse = serde_json::from_slice(&body)
            .map_err(|source| CatalogError::decode(url.as_str(), source))?;

        let results: Vec<SearchResult> = response
            .data
            .into_iter()
            .filter_map(|work| {
                let title = pick_title(&work.attributes.title)?;
                let cover_file = pick_cover_file_name(&work.relationships);
                let cover_url = self.cover_url(&work.id, &cover_file);
                Some(SearchResult {
                    id: work.id,
                    title,
                    cover_url,
                })
            })
            .collect();

        debug!(results = results.len(), "search complete");
        Ok(results)
    }

    async fn list_episodes(
        &self,
        work_id: &str,
        scope: &CallScope,
    ) -> Result<Vec<Episode>, CatalogError> {
        self.fetch_directory(work_id, scope).await
    }

    #[instrument(skip(self, episode, scope), fields(provider = "mangadex", episode_id = %episode.id))]
    async fn fetch_episode_pages(
        &self,
        episode: &Episode,
        scope: &CallScope,
    ) -> Result<Vec<PageImage>, CatalogError> {
        let detail = self.resolve_detail(&episode.id, scope).await?;
        self.download_pages(&detail, scope).await
    }

    #[instrument(skip(self, scope))]
    async fn fetch_cover(
        &self,
        cover_url: &str,
        scope: &CallScope,
    ) -> Result<Vec<u8>, CatalogError> {
        if cover_url.trim().is_empty() {
            return Err(CatalogError::invalid_url(cover_url));
        }
        self.get_ok_body(cover_url, scope).await
    }
}

pub(crate) fn parse_url(raw: &str) -> Result<Url, CatalogError> {
    Url::parse(raw).map_err(|_| CatalogError::invalid_url(raw))
}

/// English title if present, else any title; `None` when the work has none.
fn pick_title(titles: &std::collections::HashMap<String, String>) -> Option<String> {
    titles
        .get("en")
        .or_else(|| {
            let mut keys: Vec<_> = titles.keys().collect();
            keys.sort();
            keys.first().and_then(|key| titles.get(*key))
        })
        .filter(|title| !title.is_empty())
        .cloned()
}

fn pick_cover_file_name(relationships: &[Relationship]) -> String {
    relationships
        .iter()
        .filter(|relation| relation.kind == "cover_art")
        .find_map(|relation| {
            relation
                .attributes
                .as_ref()
                .and_then(|attributes| attributes.file_name.clone())
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_default()
}
