//! Collaborators behind the downloader
//!
//! Design: everything that touches the network or interprets page content
//! goes through the [`Backend`] trait, so the orchestrator can be driven by
//! an in-memory double in tests.

mod http;

pub use http::{HttpBackend, HttpOptions};

use crate::convert;
use crate::error::FetchError;
use async_trait::async_trait;

/// Sitemap search, page fetch and markdown extraction
#[async_trait]
pub trait Backend: Send + Sync {
    /// List the page URLs a sitemap references
    ///
    /// May fail on network or parse errors; callers decide how to degrade.
    async fn sitemap_search(&self, sitemap_url: &str) -> Result<Vec<String>, FetchError>;

    /// Fetch the raw content of a page, `None` when it is unavailable
    async fn fetch_page(&self, url: &str) -> Option<String>;

    /// Extract the main content of raw page content as markdown
    ///
    /// Returns `None` when the page has no extractable content.
    fn extract_markdown(&self, raw: &str) -> Option<String> {
        convert::extract_markdown(raw)
    }
}
