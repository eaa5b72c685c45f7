//! Mapping of page URLs onto the output directory tree
//!
//! A page `https://www.example.com/blog/post1` lands in
//! `<root>/example.com/blog/post1.md`. The host comes first, then every path
//! segment except the last; the last segment becomes the file stem, or
//! `index` when the path is empty.

use crate::error::LayoutError;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Stem used when a URL has no path segments
pub const INDEX_STEM: &str = "index";

/// Extension appended to every written page
pub const MARKDOWN_EXTENSION: &str = "md";

/// Where a page's markdown is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    /// Directory holding the file
    pub directory: PathBuf,
    /// File name without the markdown extension
    pub stem: String,
}

impl OutputLocation {
    /// Full path of the markdown file, `<directory>/<stem>.md`
    pub fn file_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.stem, MARKDOWN_EXTENSION))
    }
}

/// Compute the output location for `url` without touching the filesystem
pub fn locate(url: &str, output_root: &Path) -> Result<OutputLocation, LayoutError> {
    let parsed = Url::parse(url).map_err(|_| LayoutError::InvalidUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| LayoutError::InvalidUrl(url.to_string()))?;

    // Prefer the host as the caller wrote it; the parser lowercases it.
    let host = literal_host(url).unwrap_or(host);
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() || host == "." || host == ".." {
        return Err(LayoutError::InvalidUrl(url.to_string()));
    }

    let mut segments: Vec<Cow<str>> = parsed
        .path_segments()
        .map(|s| {
            s.filter(|segment| !segment.is_empty())
                .map(decode_segment)
                .collect()
        })
        .unwrap_or_default();

    let stem = segments
        .pop()
        .map(Cow::into_owned)
        .unwrap_or_else(|| INDEX_STEM.to_string());

    let mut directory = output_root.join(host);
    directory.extend(segments.iter().map(|segment| &**segment));

    Ok(OutputLocation { directory, stem })
}

/// Compute the output location for `url` and make sure its directory exists
///
/// Creating a directory that already exists is not an error, so mapping the
/// same URL twice yields the same location both times.
pub fn map_url(url: &str, output_root: &Path) -> Result<OutputLocation, LayoutError> {
    let location = locate(url, output_root)?;
    fs::create_dir_all(&location.directory).map_err(|source| LayoutError::DirectoryCreation {
        path: location.directory.clone(),
        source,
    })?;
    Ok(location)
}

/// Percent-decode a path segment for use as a file name
///
/// Segments that do not decode to UTF-8, or that would decode to a path
/// separator or a dot name, stay encoded.
fn decode_segment(segment: &str) -> Cow<'_, str> {
    match urlencoding::decode(segment) {
        Ok(decoded) if is_plain_name(&decoded) => decoded,
        _ => Cow::Borrowed(segment),
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Host exactly as it appears in the URL text, without userinfo or port
fn literal_host(url: &str) -> Option<&str> {
    let (_, rest) = url.trim().split_once("://")?;
    let authority = rest.split(['/', '\\', '?', '#']).next().unwrap_or(rest);
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);

    let host = if host_port.starts_with('[') {
        let end = host_port.find(']')?;
        &host_port[..=end]
    } else {
        host_port.split(':').next().unwrap_or(host_port)
    };

    (!host.is_empty()).then_some(host)
}
