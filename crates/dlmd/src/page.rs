//! Page download: fetch, extract, write

use crate::backend::Backend;
use crate::layout::OutputLocation;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Suffix of the file written before it is renamed into place
const PART_EXTENSION: &str = "part";

/// Result of downloading a single page
#[derive(Debug)]
pub enum PageOutcome {
    /// Markdown written to this path
    Saved(PathBuf),
    /// Page could not be retrieved
    FetchFailed,
    /// Page had no extractable content
    NoContent,
    /// Markdown could not be written
    WriteFailed(io::Error),
}

impl PageOutcome {
    /// True if a markdown file was written
    pub fn is_saved(&self) -> bool {
        matches!(self, PageOutcome::Saved(_))
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageOutcome::Saved(path) => write!(f, "Saved: {}", path.display()),
            PageOutcome::FetchFailed => write!(f, "Failed to fetch content"),
            PageOutcome::NoContent => write!(f, "No content could be extracted"),
            PageOutcome::WriteFailed(err) => write!(f, "Failed to write file: {}", err),
        }
    }
}

/// Fetch `url`, convert it to markdown and write it to `location`
///
/// Writes exactly one file on success and none otherwise.
pub async fn fetch_and_convert(
    backend: &dyn Backend,
    url: &str,
    location: &OutputLocation,
) -> PageOutcome {
    let Some(raw) = backend.fetch_page(url).await else {
        debug!(url, "No content fetched");
        return PageOutcome::FetchFailed;
    };

    let Some(markdown) = backend.extract_markdown(&raw) else {
        debug!(url, "No content extracted");
        return PageOutcome::NoContent;
    };

    let path = location.file_path();
    match write_atomically(&path, &markdown) {
        Ok(()) => {
            debug!(url, path = %path.display(), "Saved page");
            PageOutcome::Saved(path)
        }
        Err(err) => {
            warn!(url, path = %path.display(), error = %err, "Failed to write page");
            PageOutcome::WriteFailed(err)
        }
    }
}

/// Write `contents` to a sibling part file, then rename it over `path`
fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let mut part = path.as_os_str().to_owned();
    part.push(".");
    part.push(PART_EXTENSION);
    let part = PathBuf::from(part);

    let result = fs::write(&part, contents).and_then(|()| fs::rename(&part, path));
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}
