//! Sequential page download.

use tracing::{debug, instrument};

use super::MangaDexProvider;
use crate::catalog::{CatalogError, EpisodeDetail, PageImage, Quality};
use crate::scope::CallScope;

impl MangaDexProvider {
    /// Downloads every page of a resolved episode, in manifest order.
    ///
    /// Pages are fetched one at a time. There is no per-page retry; the first
    /// failed or empty fetch aborts the episode.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::MetadataMissing`] when host or hash is absent
    /// - [`CatalogError::NoPages`] when both manifests are empty
    /// - [`CatalogError::EmptyPage`] for a zero-byte page
    /// - transport, status and scope errors from any page fetch
    #[instrument(skip(self, detail, scope), fields(provider = "mangadex", episode_id = %detail.episode_id))]
    pub async fn download_pages(
        &self,
        detail: &EpisodeDetail,
        scope: &CallScope,
    ) -> Result<Vec<PageImage>, CatalogError> {
        let (quality, files) = select_manifest(detail)?;
        debug!(?quality, pages = files.len(), "downloading pages");

        let mut pages = Vec::with_capacity(files.len());
        for (index, file_name) in files.iter().enumerate() {
            let url = page_url(detail, quality, file_name);
            let bytes = self.get_ok_body(&url, scope).await?;
            if bytes.is_empty() {
                return Err(CatalogError::empty_page(url, file_name.as_str()));
            }
            pages.push(PageImage { index, bytes });
        }
        Ok(pages)
    }
}

/// Chooses the manifest to download after re-checking the delivery target.
pub(crate) fn select_manifest(
    detail: &EpisodeDetail,
) -> Result<(Quality, &[String]), CatalogError> {
    if !detail.has_delivery_target() {
        return Err(CatalogError::metadata_missing(
            &detail.episode_id,
            format!(
                "invalid detail for download (baseUrl={:?} hash={:?})",
                detail.base_url, detail.hash
            ),
        ));
    }
    detail.manifest().ok_or_else(|| {
        CatalogError::no_pages(
            &detail.episode_id,
            detail.data.len(),
            detail.data_saver.len(),
        )
    })
}

fn page_url(detail: &EpisodeDetail, quality: Quality, file_name: &str) -> String {
    format!(
        "{}/{}/{}/{file_name}",
        detail.base_url,
        quality.path_segment(),
        detail.hash
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::ErrorKind;

    fn detail(data: &[&str], data_saver: &[&str]) -> EpisodeDetail {
        EpisodeDetail {
            episode_id: "ep".to_string(),
            base_url: "https://node.test".to_string(),
            hash: "abc".to_string(),
            data: data.iter().map(ToString::to_string).collect(),
            data_saver: data_saver.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_select_manifest_falls_back_to_data_saver() {
        let detail = detail(&[], &["s1.jpg", "s2.jpg"]);
        let (quality, files) = select_manifest(&detail).unwrap();
        assert_eq!(quality, Quality::DataSaver);
        assert_eq!(files.len(), 2);
        assert_eq!(
            page_url(&detail, quality, &files[0]),
            "https://node.test/data-saver/abc/s1.jpg"
        );
    }

    #[test]
    fn test_select_manifest_without_pages_is_no_pages() {
        let err = select_manifest(&detail(&[], &[])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoPages);
        assert!(err.is_skippable());
    }

    #[test]
    fn test_select_manifest_rechecks_hash() {
        let mut detail = detail(&["p.png"], &[]);
        detail.hash.clear();
        let err = select_manifest(&detail).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetadataMissing);
    }
}
