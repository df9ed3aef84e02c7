//! Shared HTTP client construction.
//!
//! One [`reqwest::Client`] is built per process and handed to both the
//! catalog provider and the device client. The client is stateless from the
//! pipeline's point of view and safe to reuse across every call and episode.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// Default connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-request read timeout (2 minutes). Call scopes usually expire first.
pub const READ_TIMEOUT_SECS: u64 = 120;

/// Returns the User-Agent sent on every request.
#[must_use]
pub fn user_agent() -> String {
    format!("courier/{}", env!("CARGO_PKG_VERSION"))
}

/// Builds the shared HTTP client with the default timeouts.
///
/// # Errors
///
/// Returns the reqwest builder error when the TLS backend cannot initialize.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    build_http_client_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
}

/// Builds the shared HTTP client with explicit timeouts.
///
/// # Errors
///
/// Returns the reqwest builder error when the TLS backend cannot initialize.
pub fn build_http_client_with_timeouts(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
) -> Result<Client, reqwest::Error> {
    debug!(connect_timeout_secs, read_timeout_secs, "building HTTP client");
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .user_agent(user_agent())
        .gzip(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_the_tool_and_version() {
        let ua = user_agent();
        assert!(ua.starts_with("courier/"));
        assert!(ua.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_build_http_client_succeeds_with_defaults() {
        assert!(build_http_client().is_ok());
    }
}
