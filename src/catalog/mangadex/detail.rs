//! Episode detail resolution with bounded retry.

use tracing::{debug, instrument, warn};

use super::MangaDexProvider;
use super::wire::DetailResponse;
use crate::catalog::{CatalogError, EpisodeDetail};
use crate::retry::{BackoffOutcome, RetryDecision, classify_error, wait_backoff};
use crate::scope::{CallScope, ScopeExit};

impl MangaDexProvider {
    /// Resolves the delivery host, hash and manifests for one episode.
    ///
    /// Retries within the provider's [`RetryPolicy`](crate::retry::RetryPolicy):
    /// transport failures, 429/5xx statuses, undecodable bodies and missing
    /// metadata all consume the same attempt budget. Other statuses fail
    /// immediately. Cancellation during a backoff wait ends the call at once.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's [`CatalogError`] once the budget is spent,
    /// the first non-retryable error, or [`CatalogError::Cancelled`].
    #[instrument(skip(self, scope), fields(provider = "mangadex"))]
    pub async fn resolve_detail(
        &self,
        episode_id: &str,
        scope: &CallScope,
    ) -> Result<EpisodeDetail, CatalogError> {
        let url = format!("{}/at-home/server/{episode_id}", self.api_base);
        let mut attempt = 1u32;

        loop {
            let error = match self.attempt_detail(&url, episode_id, scope).await {
                Ok(detail) => {
                    debug!(attempt, "episode detail resolved");
                    return Ok(detail);
                }
                Err(error) => error,
            };

            let failure = classify_error(&error);
            match self.retry_policy.should_retry(failure, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        attempt,
                        ?failure,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "detail resolution failed, retrying"
                    );
                    if wait_backoff(scope, delay).await == BackoffOutcome::Cancelled {
                        return Err(CatalogError::from_scope(&url, ScopeExit::Cancelled));
                    }
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, %reason, "giving up on detail resolution");
                    return Err(error);
                }
            }
        }
    }

    async fn attempt_detail(
        &self,
        url: &str,
        episode_id: &str,
        scope: &CallScope,
    ) -> Result<EpisodeDetail, CatalogError> {
        let body = self.get_ok_body(url, scope).await?;
        let response: DetailResponse =
            serde_json::from_slice(&body).map_err(|source| CatalogError::decode(url, source))?;
        detail_from_response(episode_id, response)
    }
}

/// Validates a decoded detail response.
pub(crate) fn detail_from_response(
    episode_id: &str,
    response: DetailResponse,
) -> Result<EpisodeDetail, CatalogError> {
    if response.result != "ok" {
        return Err(CatalogError::metadata_missing(
            episode_id,
            format!("result was {:?}", response.result),
        ));
    }

    let manifest = response.chapter.unwrap_or_default();
    let detail = EpisodeDetail {
        episode_id: episode_id.to_string(),
        base_url: response
            .base_url
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string(),
        hash: manifest.hash.unwrap_or_default(),
        data: manifest.data,
        data_saver: manifest.data_saver,
    };

    if !detail.has_delivery_target() {
        return Err(CatalogError::metadata_missing(
            episode_id,
            format!(
                "missing baseUrl/hash (baseUrl={:?} hash={:?} data={} dataSaver={})",
                detail.base_url,
                detail.hash,
                detail.data.len(),
                detail.data_saver.len()
            ),
        ));
    }
    Ok(detail)
}
