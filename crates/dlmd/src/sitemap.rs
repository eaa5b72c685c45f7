//! Sitemap parsing and resolution
//!
//! Understands XML `<urlset>` documents, `<sitemapindex>` documents pointing
//! at further sitemaps, and plain-text sitemaps with one URL per line.

use crate::backend::Backend;
use crate::error::FetchError;
use quick_xml::events::Event;
use std::collections::BTreeSet;
use tracing::{debug, warn};
use url::Url;

/// Page and child-sitemap URLs listed by one sitemap document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// Page URLs from `<url><loc>` or plain-text lines
    pub pages: Vec<String>,
    /// Child sitemap URLs from `<sitemap><loc>`
    pub sitemaps: Vec<String>,
}

/// Resolve a sitemap to the set of page URLs it lists
///
/// Never fails: a sitemap that cannot be fetched or parsed contributes no
/// URLs and the failure is logged.
pub async fn resolve_sitemap(backend: &dyn Backend, sitemap_url: &str) -> BTreeSet<String> {
    match backend.sitemap_search(sitemap_url).await {
        Ok(urls) => {
            debug!(sitemap = sitemap_url, count = urls.len(), "Sitemap resolved");
            urls.into_iter().collect()
        }
        Err(err) => {
            warn!(sitemap = sitemap_url, error = %err, "Failed to read sitemap");
            BTreeSet::new()
        }
    }
}

/// Parse a sitemap body, XML or plain text
pub fn parse_sitemap(body: &str) -> Result<SitemapDocument, FetchError> {
    let body = body.trim_start_matches('\u{feff}').trim_start();
    if body.starts_with('<') {
        parse_xml(body)
    } else {
        parse_text(body)
    }
}

/// What a `<loc>` belongs to
#[derive(Clone, Copy)]
enum Entry {
    Page,
    Sitemap,
}

fn parse_xml(xml: &str) -> Result<SitemapDocument, FetchError> {
    let mut doc = SitemapDocument::default();
    let mut is_sitemap = false;
    let mut depth = 0usize;
    // Open <url>/<sitemap> and its depth
    let mut entry: Option<(Entry, usize)> = None;
    let mut loc: Option<String> = None;

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"urlset" | b"sitemapindex" => is_sitemap = true,
                    b"url" if entry.is_none() => entry = Some((Entry::Page, depth)),
                    b"sitemap" if entry.is_none() => entry = Some((Entry::Sitemap, depth)),
                    // Only a direct child <loc>; <image:loc> and friends are nested deeper
                    b"loc" if matches!(entry, Some((_, d)) if d + 1 == depth) => {
                        loc = Some(String::new());
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                if matches!(e.local_name().as_ref(), b"urlset" | b"sitemapindex") {
                    is_sitemap = true;
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(loc) = loc.as_mut() {
                    match e.unescape() {
                        Ok(text) => loc.push_str(&text),
                        Err(_) => loc.push_str(&String::from_utf8_lossy(e)),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(loc) = loc.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(ref e)) => {
                match e.local_name().as_ref() {
                    b"loc" => {
                        if let (Some(value), Some((kind, _))) = (loc.take(), entry) {
                            let value = value.trim();
                            if !value.is_empty() {
                                match kind {
                                    Entry::Page => doc.pages.push(value.to_string()),
                                    Entry::Sitemap => doc.sitemaps.push(value.to_string()),
                                }
                            }
                        }
                    }
                    b"url" | b"sitemap" if matches!(entry, Some((_, d)) if d == depth) => {
                        entry = None;
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::InvalidSitemap(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if is_sitemap {
        Ok(doc)
    } else {
        Err(FetchError::NotASitemap)
    }
}

fn parse_text(body: &str) -> Result<SitemapDocument, FetchError> {
    let pages: Vec<String> = body
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(str::to_string)
        .collect();

    if pages.is_empty() {
        return Err(FetchError::NotASitemap);
    }

    Ok(SitemapDocument {
        pages,
        sitemaps: Vec::new(),
    })
}

/// True if the URL points at a sitemap rather than at a site
pub fn looks_like_sitemap(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.ends_with(".xml")
        || path.ends_with(".xml.gz")
        || path.ends_with(".txt")
        || path.contains("sitemap")
}

/// Sitemap URLs announced by `Sitemap:` lines of a robots.txt
pub fn sitemaps_from_robots(robots: &str, origin: &Url) -> Vec<String> {
    robots
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("sitemap") {
                return None;
            }
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            origin.join(value).ok().map(String::from)
        })
        .collect()
}

/// `<origin>/sitemap.xml`, the conventional sitemap location
pub fn default_sitemap_url(origin: &Url) -> Option<String> {
    origin.join("/sitemap.xml").ok().map(String::from)
}
