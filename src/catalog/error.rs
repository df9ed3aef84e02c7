//! Error types for catalog operations.
//!
//! Two variants, [`CatalogError::MetadataMissing`] and [`CatalogError::NoPages`],
//! are *skip-classified*: the pipeline records them and moves on to the next
//! episode. Everything else aborts a batch.

use thiserror::Error;

use crate::scope::ScopeExit;

/// Coarse classification of a [`CatalogError`], used for control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, DNS, TLS or mid-body transport failure.
    Transport,
    /// Non-success HTTP status.
    Status,
    /// Response body could not be decoded.
    Decode,
    /// Detail resolution returned no usable host/hash or a bad result code.
    MetadataMissing,
    /// Neither quality tier lists any page.
    NoPages,
    /// A page fetch returned zero bytes.
    EmptyPage,
    /// The call's deadline passed.
    Deadline,
    /// The call's scope was cancelled.
    Cancelled,
    /// A URL could not be built or was empty.
    InvalidUrl,
}

/// Errors that can occur while talking to a catalog source.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-level error (DNS, connection refused, TLS, body read).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL being requested.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        /// The URL being requested.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Trimmed response body, for diagnostics.
        body: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        /// The URL being requested.
        url: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The detail response lacked a delivery host/hash or reported a non-"ok" result.
    #[error("episode metadata missing for {episode_id}: {reason}")]
    MetadataMissing {
        /// The episode being resolved.
        episode_id: String,
        /// What was missing.
        reason: String,
    },

    /// Both the primary and reduced-quality manifests were empty.
    #[error("episode {episode_id} has no pages (data={data}, dataSaver={data_saver})")]
    NoPages {
        /// The episode being downloaded.
        episode_id: String,
        /// Length of the primary manifest.
        data: usize,
        /// Length of the reduced-quality manifest.
        data_saver: usize,
    },

    /// A page fetch completed with an empty body.
    #[error("downloaded page {file_name} is empty ({url})")]
    EmptyPage {
        /// The page URL.
        url: String,
        /// The manifest file name.
        file_name: String,
    },

    /// The caller's deadline passed before the call completed.
    #[error("deadline exceeded requesting {url}")]
    DeadlineExceeded {
        /// The URL being requested.
        url: String,
    },

    /// The caller cancelled the call.
    #[error("request to {url} was cancelled")]
    Cancelled {
        /// The URL being requested.
        url: String,
    },

    /// A URL could not be constructed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL or fragment.
        url: String,
    },
}

impl CatalogError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16, body: &str) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            body: body.trim().to_string(),
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates a metadata-missing error.
    pub fn metadata_missing(episode_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MetadataMissing {
            episode_id: episode_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a no-pages error.
    pub fn no_pages(episode_id: impl Into<String>, data: usize, data_saver: usize) -> Self {
        Self::NoPages {
            episode_id: episode_id.into(),
            data,
            data_saver,
        }
    }

    /// Creates an empty-page error.
    pub fn empty_page(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::EmptyPage {
            url: url.into(),
            file_name: file_name.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Maps a scope exit to the matching error for `url`.
    pub fn from_scope(url: impl Into<String>, exit: ScopeExit) -> Self {
        let url = url.into();
        match exit {
            ScopeExit::Cancelled => Self::Cancelled { url },
            ScopeExit::DeadlineExceeded => Self::DeadlineExceeded { url },
        }
    }

    /// Returns the coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Transport,
            Self::HttpStatus { .. } => ErrorKind::Status,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::MetadataMissing { .. } => ErrorKind::MetadataMissing,
            Self::NoPages { .. } => ErrorKind::NoPages,
            Self::EmptyPage { .. } => ErrorKind::EmptyPage,
            Self::DeadlineExceeded { .. } => ErrorKind::Deadline,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
        }
    }

    /// Returns true when the failure should skip one episode rather than
    /// abort the whole batch.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MetadataMissing | ErrorKind::NoPages
        )
    }

    /// Returns the HTTP status code, when this is a status error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
