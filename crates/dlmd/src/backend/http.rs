//! HTTP backend
//!
//! Fetches sitemaps and pages over HTTP/HTTPS with reqwest. Sitemap search
//! follows sitemap indexes and, for site URLs, discovers sitemaps through
//! robots.txt.

use crate::backend::Backend;
use crate::error::FetchError;
use crate::sitemap::{default_sitemap_url, looks_like_sitemap, parse_sitemap, sitemaps_from_robots};
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Binary content type prefixes
const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-tar",
    "application/x-rar",
    "application/x-7z",
    "application/vnd.ms-",
    "application/vnd.openxmlformats",
    "font/",
];

/// Time allowed to establish a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for a whole request, body included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default largest body accepted, in bytes
pub const DEFAULT_MAX_BODY_SIZE: u64 = 20 * 1024 * 1024;

/// Default number of sitemap documents read per search
pub const DEFAULT_MAX_SITEMAPS: usize = 1000;

const PAGE_ACCEPT: &str = "text/html, application/xhtml+xml, */*;q=0.8";
const SITEMAP_ACCEPT: &str = "application/xml, text/xml, text/plain, */*;q=0.8";

/// Options for the HTTP backend
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Custom User-Agent
    pub user_agent: Option<String>,
    /// Timeout for a whole request
    pub timeout: Duration,
    /// Largest body accepted
    pub max_body_size: u64,
    /// Most sitemap documents read while following indexes
    pub max_sitemaps: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_sitemaps: DEFAULT_MAX_SITEMAPS,
        }
    }
}

/// Backend talking to real sites
///
/// Holds one reqwest client for the whole run. Every request is attempted
/// once; there are no retries.
pub struct HttpBackend {
    client: reqwest::Client,
    options: HttpOptions,
}

impl HttpBackend {
    /// Create a backend with the given options
    ///
    /// Fails when the User-Agent is not a valid header value.
    pub fn new(options: HttpOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        let user_agent = options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|_| FetchError::InvalidUserAgent(user_agent.to_string()))?;
        headers.insert(USER_AGENT, user_agent);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(options.timeout)
            .build()
            .map_err(FetchError::ClientBuildError)?;

        Ok(Self { client, options })
    }

    /// GET a URL and return its body as text
    ///
    /// Non-success statuses, binary content types and oversized bodies are
    /// errors.
    async fn get_text(&self, url: &str, accept: &'static str) -> Result<String, FetchError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FetchError::InvalidUrlScheme);
        }

        let response = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static(accept))
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        if let Some(ct) = content_type {
            if is_binary_content_type(&ct) {
                return Err(FetchError::BinaryContent(ct));
            }
        }

        let body = read_body_limited(response, self.options.max_body_size).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Sitemaps to start from for a URL given by the user
    ///
    /// Sitemap-looking URLs are used as is. For anything else, robots.txt is
    /// consulted, falling back to `/sitemap.xml`.
    async fn discover(&self, url: &Url) -> Vec<String> {
        if looks_like_sitemap(url) {
            return vec![url.to_string()];
        }

        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(_) => return default_sitemap_url(url).into_iter().collect(),
        };

        match self.get_text(robots_url.as_str(), "text/plain, */*;q=0.8").await {
            Ok(robots) => {
                let found = sitemaps_from_robots(&robots, url);
                if !found.is_empty() {
                    debug!(robots = %robots_url, count = found.len(), "Sitemaps listed in robots.txt");
                    return found;
                }
            }
            Err(err) => {
                debug!(robots = %robots_url, error = %err, "robots.txt unavailable");
            }
        }

        default_sitemap_url(url).into_iter().collect()
    }

    /// Read sitemaps breadth-first, following indexes
    ///
    /// Fails only if not a single sitemap document could be read.
    async fn crawl(&self, roots: Vec<String>) -> Result<Vec<String>, FetchError> {
        let mut queue: VecDeque<String> = roots.into_iter().collect();
        let mut seen: HashSet<String> = queue.iter().cloned().collect();
        let mut pages = Vec::new();
        let mut read = 0usize;
        let mut last_error = None;

        while let Some(sitemap_url) = queue.pop_front() {
            if read >= self.options.max_sitemaps {
                warn!(
                    limit = self.options.max_sitemaps,
                    skipped = queue.len() + 1,
                    "Sitemap limit reached"
                );
                break;
            }

            let doc = match self.get_text(&sitemap_url, SITEMAP_ACCEPT).await {
                Ok(body) => parse_sitemap(&body),
                Err(err) => Err(err),
            };

            match doc {
                Ok(doc) => {
                    read += 1;
                    debug!(
                        sitemap = %sitemap_url,
                        pages = doc.pages.len(),
                        children = doc.sitemaps.len(),
                        "Read sitemap"
                    );
                    pages.extend(doc.pages);
                    for child in doc.sitemaps {
                        if seen.insert(child.clone()) {
                            queue.push_back(child);
                        }
                    }
                }
                Err(err) => {
                    warn!(sitemap = %sitemap_url, error = %err, "Skipping sitemap");
                    last_error = Some(err);
                }
            }
        }

        match (read, last_error) {
            (0, Some(err)) => Err(err),
            _ => Ok(pages),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn sitemap_search(&self, sitemap_url: &str) -> Result<Vec<String>, FetchError> {
        if !sitemap_url.starts_with("http://") && !sitemap_url.starts_with("https://") {
            return Err(FetchError::InvalidUrlScheme);
        }
        let parsed =
            Url::parse(sitemap_url).map_err(|_| FetchError::InvalidUrl(sitemap_url.to_string()))?;

        let roots = self.discover(&parsed).await;
        self.crawl(roots).await
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        match self.get_text(url, PAGE_ACCEPT).await {
            Ok(body) => Some(body),
            Err(err) => {
                debug!(url, error = %err, "Page fetch failed");
                None
            }
        }
    }
}

/// Check if content type indicates binary content
fn is_binary_content_type(content_type: &str) -> bool {
    let ct_lower = content_type.to_lowercase();
    BINARY_PREFIXES
        .iter()
        .any(|prefix| ct_lower.starts_with(prefix))
}

/// Read a response body, refusing anything over `limit` bytes
async fn read_body_limited(response: reqwest::Response, limit: u64) -> Result<Bytes, FetchError> {
    if response.content_length().is_some_and(|len| len > limit) {
        return Err(FetchError::BodyTooLarge(limit));
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(FetchError::from_reqwest)?;
        body.extend_from_slice(&bytes);
        if body.len() as u64 > limit {
            return Err(FetchError::BodyTooLarge(limit));
        }
    }

    Ok(Bytes::from(body))
}
