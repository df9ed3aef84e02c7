//! Courier Core Library
//!
//! Fetches the episodes of an illustrated work from a catalog service,
//! packages each episode's pages as a CBZ archive, and uploads the archives
//! to a networked reading device.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Catalog provider trait, episode types and the MangaDex source
//! - [`retry`] - Bounded retry with quadratic backoff for detail resolution
//! - [`scope`] - Cancellable, deadline-bound scopes for every outbound call
//! - [`archive`] - CBZ packaging
//! - [`device`] - Upload gateway trait and the device HTTP client
//! - [`pipeline`] - Batch orchestration and the progress stream
//! - [`naming`] - Device-safe file and folder names
//! - [`http_client`] - Shared HTTP client construction

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod catalog;
pub mod device;
pub mod http_client;
pub mod naming;
pub mod pipeline;
pub mod retry;
pub mod scope;

// Re-export commonly used types
pub use archive::{PackageError, build_archive, entry_name};
pub use catalog::{
    CatalogError, CatalogProvider, Episode, EpisodeDetail, ErrorKind, MangaDexProvider,
    PageImage, SearchResult,
};
pub use device::{DeviceClient, DeviceDetails, DeviceError, UploadGateway};
pub use http_client::build_http_client;
pub use pipeline::{
    Pipeline, PipelineError, PipelineReport, ProgressTracker, ProgressUpdate, SkipSummary,
    SkippedEpisode, progress_channel, spawn_pipeline,
};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
pub use scope::CallScope;
