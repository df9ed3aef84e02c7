//! Batch orchestration: download, package and upload each episode in turn.
//!
//! # Run shape
//!
//! ```text
//! create folder (failure falls back to root)
//! for each episode:
//!     download  --skip error--> record, advance 3 steps, next episode
//!               --other------> abort
//!     package   --error------> abort
//!     upload    --error------> abort
//! any skips?  -> EpisodesSkipped summary
//! ```
//!
//! Everything is sequential. Only one episode's pages are held at a time.

mod error;
mod progress;

pub use error::{PipelineError, SkipSummary, SkippedEpisode};
pub use progress::{ProgressTracker, ProgressUpdate, progress_channel};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

use crate::archive::build_archive;
use crate::catalog::{CatalogProvider, Episode, ErrorKind};
use crate::device::UploadGateway;
use crate::naming::{archive_file_name, sanitize_file_name};
use crate::scope::{CallScope, DEVICE_TIMEOUT, EPISODE_FETCH_TIMEOUT};

/// Progress steps per episode: download, package, upload.
pub const STEPS_PER_EPISODE: usize = 3;

/// Message emitted when the destination folder cannot be created.
pub const FOLDER_FALLBACK_MESSAGE: &str = "Unable to create folder, uploading to root";

/// Result of a run that processed every episode without skips.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Destination folder id; `None` when uploads went to the root.
    pub folder_id: Option<String>,
    /// Uploaded file names, in run order.
    pub uploaded: Vec<String>,
}

/// Drives episodes from a catalog to an upload gateway.
#[derive(Clone)]
pub struct Pipeline {
    provider: Arc<dyn CatalogProvider>,
    gateway: Arc<dyn UploadGateway>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline over the given collaborators.
    #[must_use]
    pub fn new(provider: Arc<dyn CatalogProvider>, gateway: Arc<dyn UploadGateway>) -> Self {
        Self { provider, gateway }
    }

    /// Runs one batch.
    ///
    /// Episodes are processed in slice order. Progress is published through
    /// `progress`; the caller is responsible for the terminal update (see
    /// [`spawn_pipeline`]).
    ///
    /// # Errors
    ///
    /// - [`PipelineError::EpisodesSkipped`] when the batch completed with skips
    /// - [`PipelineError::NoEpisodes`] for an empty batch
    /// - [`PipelineError::Cancelled`] when `scope` is cancelled
    /// - `Download`, `Package` or `Upload` for the first batch-aborting failure
    pub async fn run(
        &self,
        work_title: &str,
        episodes: &[Episode],
        progress: &mut ProgressTracker,
        scope: &CallScope,
    ) -> Result<PipelineReport, PipelineError> {
        let span = info_span!(
            "pipeline_run",
            work = %work_title,
            episodes = episodes.len(),
            provider = self.provider.name()
        );
        self.run_batch(work_title, episodes, progress, scope)
            .instrument(span)
            .await
    }

    async fn run_batch(
        &self,
        work_title: &str,
        episodes: &[Episode],
        progress: &mut ProgressTracker,
        scope: &CallScope,
    ) -> Result<PipelineReport, PipelineError> {
        if episodes.is_empty() {
            return Err(PipelineError::NoEpisodes);
        }

        let folder_id = self.create_folder(work_title, progress, scope).await;
        let destination = folder_id.clone().unwrap_or_default();
        let count = episodes.len();
        let mut summary = SkipSummary::default();

        for (position, episode) in episodes.iter().enumerate() {
            if scope.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let label = episode.label();
            let prefix = format!("Chapter {}/{count}: ", position + 1);

            progress
                .message(format!("{prefix}Downloading pages for {label}"))
                .await;
            let fetch_scope = scope.child_with_timeout(EPISODE_FETCH_TIMEOUT);
            let pages = match self.provider.fetch_episode_pages(episode, &fetch_scope).await {
                Ok(pages) => pages,
                Err(error) if error.is_skippable() => {
                    warn!(episode_id = %episode.id, %error, "skipping episode");
                    progress
                        .skip(STEPS_PER_EPISODE, format!("{prefix}Skipped {label}"))
                        .await;
                    summary.skipped.push(SkippedEpisode {
                        episode_id: episode.id.clone(),
                        label,
                        error,
                    });
                    continue;
                }
                Err(error) if error.kind() == ErrorKind::Cancelled => {
                    return Err(PipelineError::Cancelled);
                }
                Err(source) => {
                    return Err(PipelineError::Download {
                        episode: label,
                        source,
                    });
                }
            };
            progress
                .advance(format!("{prefix}Downloaded pages for {label}"))
                .await;

            progress
                .message(format!("{prefix}Creating CBZ for {label}"))
                .await;
            let archive_name = sanitize_file_name(&label);
            let archive = build_archive(&archive_name, &pages).map_err(|source| {
                PipelineError::Package {
                    episode: label.clone(),
                    source,
                }
            })?;
            drop(pages);
            progress
                .advance(format!("{prefix}Created CBZ for {label}"))
                .await;

            progress.message(format!("{prefix}Uploading {label}")).await;
            let file_name = archive_file_name(&label);
            let upload_scope = scope.child_with_timeout(DEVICE_TIMEOUT);
            if let Err(source) = self
                .gateway
                .upload_file(&destination, &file_name, archive, &upload_scope)
                .await
            {
                if source.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                return Err(PipelineError::Upload {
                    episode: label,
                    source,
                });
            }
            progress.advance(format!("{prefix}Uploaded {label}")).await;
            info!(episode_id = %episode.id, file = %file_name, "episode uploaded");
            summary.uploaded.push(file_name);
        }

        if summary.skipped.is_empty() {
            Ok(PipelineReport {
                folder_id,
                uploaded: summary.uploaded,
            })
        } else {
            warn!(skipped = summary.skipped.len(), "run finished with skipped episodes");
            Err(PipelineError::EpisodesSkipped(summary))
        }
    }

    /// Creates the work's folder; `None` means upload to the root.
    async fn create_folder(
        &self,
        work_title: &str,
        progress: &ProgressTracker,
        scope: &CallScope,
    ) -> Option<String> {
        let name = sanitize_file_name(work_title);
        let folder_scope = scope.child_with_timeout(DEVICE_TIMEOUT);
        match self.gateway.create_folder(None, &name, &folder_scope).await {
            Ok(id) if !id.is_empty() => Some(id),
            Ok(_) => {
                warn!(folder = %name, "device returned an empty folder id");
                progress.message(FOLDER_FALLBACK_MESSAGE).await;
                None
            }
            Err(error) => {
                warn!(folder = %name, %error, "folder creation failed");
                progress.message(FOLDER_FALLBACK_MESSAGE).await;
                None
            }
        }
    }
}

/// Runs `pipeline` on its own task and streams progress into `sender`.
///
/// The task emits exactly one final `done = true` update, carrying the
/// terminal error text if any, then drops `sender`.
pub fn spawn_pipeline(
    pipeline: Pipeline,
    work_title: String,
    episodes: Vec<Episode>,
    sender: mpsc::Sender<ProgressUpdate>,
    scope: CallScope,
) -> JoinHandle<Result<PipelineReport, PipelineError>> {
    tokio::spawn(async move {
        let mut tracker = ProgressTracker::new(sender, episodes.len() * STEPS_PER_EPISODE);
        let result = pipeline
            .run(&work_title, &episodes, &mut tracker, &scope)
            .await;

        let (message, error, aborted) = match &result {
            Ok(report) => (
                format!("Uploaded {} episode(s)", report.uploaded.len()),
                None,
                false,
            ),
            Err(error) => (
                if error.is_fatal() {
                    "Failed".to_string()
                } else {
                    "Finished with skipped episodes".to_string()
                },
                Some(error.to_string()),
                error.is_fatal(),
            ),
        };
        tracker.finish(message, error, aborted).await;
        result
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::catalog::{CatalogError, PageImage, SearchResult};
    use crate::device::DeviceError;

    #[derive(Clone, Copy)]
    enum Outcome {
        Pages(usize),
        MetadataMissing,
        NoPages,
        NotFound,
    }

    #[derive(Default)]
    struct FakeProvider {
        outcomes: HashMap<String, Outcome>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn with(outcomes: &[(&str, Outcome)]) -> Self {
            Self {
                outcomes: outcomes
                    .iter()
                    .map(|(id, outcome)| ((*id).to_string(), *outcome))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn search(
            &self,
            _query: &str,
            _scope: &CallScope,
        ) -> Result<Vec<SearchResult>, CatalogError> {
            Ok(Vec::new())
        }

        async fn list_episodes(
            &self,
            _work_id: &str,
            _scope: &CallScope,
        ) -> Result<Vec<Episode>, CatalogError> {
            Ok(Vec::new())
        }

        async fn fetch_episode_pages(
            &self,
            episode: &Episode,
            _scope: &CallScope,
        ) -> Result<Vec<PageImage>, CatalogError> {
            self.calls.lock().unwrap().push(episode.id.clone());
            match self.outcomes[&episode.id] {
                Outcome::Pages(n) => Ok((0..n)
                    .map(|index| PageImage {
                        index,
                        bytes: vec![0xFF, 0xD8, u8::try_from(index).unwrap()],
                    })
                    .collect()),
                Outcome::MetadataMissing => {
                    Err(CatalogError::metadata_missing(&episode.id, "empty baseUrl"))
                }
                Outcome::NoPages => Err(CatalogError::no_pages(&episode.id, 0, 0)),
                Outcome::NotFound => Err(CatalogError::http_status("https://x", 404, "gone")),
            }
        }

        async fn fetch_cover(
            &self,
            _cover_url: &str,
            _scope: &CallScope,
        ) -> Result<Vec<u8>, CatalogError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct FakeGateway {
        fail_folder: bool,
        fail_upload_at: Option<usize>,
        uploads: Mutex<Vec<(String, String, usize)>>,
    }

    impl FakeGateway {
        fn uploads(&self) -> Vec<(String, String, usize)> {
            self.uploads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UploadGateway for FakeGateway {
        async fn create_folder(
            &self,
            _parent: Option<&str>,
            _name: &str,
            _scope: &CallScope,
        ) -> Result<String, DeviceError> {
            if self.fail_folder {
                Err(DeviceError::status("/api/library", 500, "nope"))
            } else {
                Ok("folder-1".to_string())
            }
        }

        async fn upload_file(
            &self,
            folder_id: &str,
            file_name: &str,
            bytes: Vec<u8>,
            _scope: &CallScope,
        ) -> Result<(), DeviceError> {
            let mut uploads = self.uploads.lock().unwrap();
            if self.fail_upload_at == Some(uploads.len()) {
                return Err(DeviceError::status("/api/library/upload", 500, "disk full"));
            }
            uploads.push((folder_id.to_string(), file_name.to_string(), bytes.len()));
            Ok(())
        }
    }

    fn episodes(ids: &[&str]) -> Vec<Episode> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Episode::new(*id, (i + 1).to_string(), "", ""))
            .collect()
    }

    fn pipeline(provider: &Arc<FakeProvider>, gateway: &Arc<FakeGateway>) -> Pipeline {
        Pipeline::new(provider.clone(), gateway.clone())
    }

    async fn drain(mut rx: mpsc::Receiver<ProgressUpdate>) -> Vec<ProgressUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_run_uploads_every_episode_into_folder() {
        let provider = Arc::new(FakeProvider::with(&[
            ("e1", Outcome::Pages(3)),
            ("e2", Outcome::Pages(1)),
        ]));
        let gateway = Arc::new(FakeGateway::default());
        let mut tracker = ProgressTracker::detached(6);

        let report = pipeline(&provider, &gateway)
            .run("My Work", &episodes(&["e1", "e2"]), &mut tracker, &CallScope::new())
            .await
            .unwrap();

        assert_eq!(report.folder_id.as_deref(), Some("folder-1"));
        assert_eq!(report.uploaded, ["Chapter 1.cbz", "Chapter 2.cbz"]);
        assert_eq!(tracker.current(), 6);
        let uploads = gateway.uploads();
        assert!(uploads.iter().all(|(folder, _, size)| folder == "folder-1" && *size > 0));
    }

    #[tokio::test]
    async fn test_skip_errors_do_not_halt_the_batch() {
        let provider = Arc::new(FakeProvider::with(&[
            ("e1", Outcome::MetadataMissing),
            ("e2", Outcome::NoPages),
            ("e3", Outcome::Pages(2)),
        ]));
        let gateway = Arc::new(FakeGateway::default());
        let mut tracker = ProgressTracker::detached(9);

        let err = pipeline(&provider, &gateway)
            .run("W", &episodes(&["e1", "e2", "e3"]), &mut tracker, &CallScope::new())
            .await
            .unwrap_err();

        let PipelineError::EpisodesSkipped(summary) = &err else {
            panic!("expected skip summary, got {err:?}");
        };
        assert_eq!(summary.skipped.len(), 2);
        assert_eq!(summary.uploaded, ["Chapter 3.cbz"]);
        assert!(err.to_string().starts_with("skipped 2 episode(s): "));
        assert_eq!(provider.calls(), ["e1", "e2", "e3"]);
        assert_eq!(tracker.current(), 9);
    }

    #[tokio::test]
    async fn test_fatal_download_error_halts_before_next_episode() {
        let provider = Arc::new(FakeProvider::with(&[
            ("e1", Outcome::NotFound),
            ("e2", Outcome::Pages(1)),
        ]));
        let gateway = Arc::new(FakeGateway::default());
        let mut tracker = ProgressTracker::detached(6);

        let err = pipeline(&provider, &gateway)
            .run("W", &episodes(&["e1", "e2"]), &mut tracker, &CallScope::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Download { .. }));
        assert_eq!(provider.calls(), ["e1"]);
        assert!(gateway.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_without_rollback() {
        let provider = Arc::new(FakeProvider::with(&[
            ("e1", Outcome::Pages(1)),
            ("e2", Outcome::Pages(1)),
        ]));
        let gateway = Arc::new(FakeGateway {
            fail_upload_at: Some(1),
            ..FakeGateway::default()
        });
        let mut tracker = ProgressTracker::detached(6);

        let err = pipeline(&provider, &gateway)
            .run("W", &episodes(&["e1", "e2"]), &mut tracker, &CallScope::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Upload { .. }));
        assert!(err.is_fatal());
        assert_eq!(gateway.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_folder_failure_falls_back_to_root() {
        let provider = Arc::new(FakeProvider::with(&[("e1", Outcome::Pages(1))]));
        let gateway = Arc::new(FakeGateway {
            fail_folder: true,
            ..FakeGateway::default()
        });
        let (tx, rx) = mpsc::channel(16);
        let mut tracker = ProgressTracker::new(tx, 3);

        let report = pipeline(&provider, &gateway)
            .run("W", &episodes(&["e1"]), &mut tracker, &CallScope::new())
            .await
            .unwrap();
        drop(tracker);

        assert!(report.folder_id.is_none());
        assert_eq!(gateway.uploads()[0].0, "");
        let updates = drain(rx).await;
        assert_eq!(updates[0].message, FOLDER_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let provider = Arc::new(FakeProvider::default());
        let gateway = Arc::new(FakeGateway::default());
        let mut tracker = ProgressTracker::detached(0);
        let err = pipeline(&provider, &gateway)
            .run("W", &[], &mut tracker, &CallScope::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoEpisodes));
    }

    #[tokio::test]
    async fn test_cancelled_scope_stops_the_run() {
        let provider = Arc::new(FakeProvider::with(&[("e1", Outcome::Pages(1))]));
        let gateway = Arc::new(FakeGateway::default());
        let scope = CallScope::new();
        scope.cancel();
        let mut tracker = ProgressTracker::detached(3);
        let err = pipeline(&provider, &gateway)
            .run("W", &episodes(&["e1"]), &mut tracker, &scope)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_run_streams_ordered_progress_with_one_done() {
        let provider = Arc::new(FakeProvider::with(&[
            ("e1", Outcome::Pages(2)),
            ("e2", Outcome::MetadataMissing),
        ]));
        let gateway = Arc::new(FakeGateway::default());
        let list = episodes(&["e1", "e2"]);
        let (tx, rx) = progress_channel(list.len());

        let handle = spawn_pipeline(
            pipeline(&provider, &gateway),
            "W".to_string(),
            list,
            tx,
            CallScope::new(),
        );
        let updates = drain(rx).await;
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(PipelineError::EpisodesSkipped(_))));
        assert_eq!(updates.iter().filter(|u| u.done).count(), 1);
        let last = updates.last().unwrap();
        assert!(last.done);
        assert_eq!(last.current, last.total);
        assert!(last.error.as_deref().unwrap().contains("skipped 1 episode(s)"));
        assert!(updates.windows(2).all(|w| w[0].current <= w[1].current));
        assert!(updates.iter().all(|u| u.current <= u.total));

        let messages: Vec<_> = updates.iter().map(|u| u.message.as_str()).collect();
        assert_eq!(
            &messages[..7],
            [
                "Chapter 1/2: Downloading pages for Chapter 1",
                "Chapter 1/2: Downloaded pages for Chapter 1",
                "Chapter 1/2: Creating CBZ for Chapter 1",
                "Chapter 1/2: Created CBZ for Chapter 1",
                "Chapter 1/2: Uploading Chapter 1",
                "Chapter 1/2: Uploaded Chapter 1",
                "Chapter 2/2: Downloading pages for Chapter 2",
            ]
        );
        assert_eq!(messages[7], "Chapter 2/2: Skipped Chapter 2");
    }
}
