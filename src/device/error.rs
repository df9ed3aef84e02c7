//! Error types for device calls.

use thiserror::Error;

use crate::scope::ScopeExit;

/// Errors returned by the reading device's HTTP API.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Transport failure reaching the device.
    #[error("device request to {endpoint} failed: {source}")]
    Network {
        /// Endpoint path or URL.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The device answered with a non-200 status.
    #[error("device returned HTTP {status} for {endpoint}: {body}")]
    Status {
        /// Endpoint path or URL.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Trimmed response body.
        body: String,
    },

    /// The device's JSON reply could not be decoded.
    #[error("unable to decode device response from {endpoint}: {source}")]
    Decode {
        /// Endpoint path or URL.
        endpoint: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The call's scope was cancelled.
    #[error("device request to {endpoint} was cancelled")]
    Cancelled {
        /// Endpoint path or URL.
        endpoint: String,
    },

    /// The call's deadline passed.
    #[error("device request to {endpoint} timed out")]
    DeadlineExceeded {
        /// Endpoint path or URL.
        endpoint: String,
    },
}

impl DeviceError {
    /// Creates a network error.
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates a status error; the body is trimmed.
    pub fn status(endpoint: impl Into<String>, status: u16, body: &str) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
            body: body.trim().to_string(),
        }
    }

    /// Creates a decode error.
    pub fn decode(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Maps a scope exit onto the matching variant.
    pub fn from_scope(endpoint: impl Into<String>, exit: ScopeExit) -> Self {
        let endpoint = endpoint.into();
        match exit {
            ScopeExit::Cancelled => Self::Cancelled { endpoint },
            ScopeExit::DeadlineExceeded => Self::DeadlineExceeded { endpoint },
        }
    }

    /// Returns true when the call ended because its scope was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
