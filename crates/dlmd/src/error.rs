//! Error types for dl-md

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to a remote site
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL has invalid scheme
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrlScheme,

    /// User-Agent is not a valid header value
    #[error("Invalid User-Agent: {0:?}")]
    InvalidUserAgent(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Failed to connect to server
    #[error("Failed to connect to server")]
    ConnectError(#[source] reqwest::Error),

    /// Other request error
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Server answered with a non-success status
    #[error("Server responded with status {0}")]
    HttpStatus(u16),

    /// Response is not textual
    #[error("Binary content is not supported: {0}")]
    BinaryContent(String),

    /// Response body is larger than the configured limit
    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(u64),

    /// Document is neither a urlset, a sitemap index nor a plain URL list
    #[error("Document is not a sitemap")]
    NotASitemap,

    /// Sitemap XML could not be parsed
    #[error("Malformed sitemap XML: {0}")]
    InvalidSitemap(String),
}

impl FetchError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::ConnectError(err)
        } else {
            FetchError::RequestError(err.to_string())
        }
    }
}

/// Errors from mapping a page URL onto the output tree
#[derive(Debug, Error)]
pub enum LayoutError {
    /// URL is not absolute or has no host
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Output directory could not be created
    #[error("Failed to create directory {}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
