//! Run orchestration
//!
//! Resolves every sitemap, merges the page URLs into one sorted set, then
//! either lists them (dry run) or downloads them one after another. Progress
//! and the final report go to the supplied writer; per-URL failures are
//! counted, never fatal.

use crate::backend::Backend;
use crate::layout::{locate, map_url};
use crate::page::fetch_and_convert;
use crate::sitemap::resolve_sitemap;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Root of the output tree
    pub output_dir: PathBuf,
    /// Only list the URLs that would be processed
    pub dry_run: bool,
    /// Print a line per sitemap and per URL
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            dry_run: false,
            verbose: false,
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Unique page URLs across all sitemaps
    pub discovered: usize,
    /// Pages written
    pub succeeded: usize,
    /// Pages that could not be mapped, fetched, extracted or written
    pub failed: usize,
}

/// Run the downloader over `sitemap_urls`
///
/// Only errors writing to `out` are returned.
pub async fn run<W: Write>(
    backend: &dyn Backend,
    sitemap_urls: &[String],
    config: &RunConfig,
    out: &mut W,
) -> io::Result<RunSummary> {
    let urls = collect_urls(backend, sitemap_urls, config.verbose, out).await?;
    let mut summary = RunSummary {
        discovered: urls.len(),
        ..Default::default()
    };

    if config.dry_run {
        print_dry_run(&urls, config, out)?;
        return Ok(summary);
    }

    writeln!(out, "Found {} unique URLs to process", urls.len())?;
    info!(count = urls.len(), output_dir = %config.output_dir.display(), "Starting downloads");

    for url in &urls {
        if process_url(backend, url, config, out).await? {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
        }
    }

    writeln!(out)?;
    writeln!(out, "Successfully processed: {}", summary.succeeded)?;
    writeln!(out, "Failed: {}", summary.failed)?;
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Run finished"
    );

    Ok(summary)
}

/// Resolve every sitemap and merge the page URLs
async fn collect_urls<W: Write>(
    backend: &dyn Backend,
    sitemap_urls: &[String],
    verbose: bool,
    out: &mut W,
) -> io::Result<BTreeSet<String>> {
    let mut all = BTreeSet::new();

    for sitemap_url in sitemap_urls {
        if verbose {
            writeln!(out, "Processing sitemap: {}", sitemap_url)?;
        }
        let urls = resolve_sitemap(backend, sitemap_url).await;
        if verbose {
            writeln!(out, "  Found {} URLs in sitemap", urls.len())?;
        }
        all.extend(urls);
    }

    Ok(all)
}

fn print_dry_run<W: Write>(
    urls: &BTreeSet<String>,
    config: &RunConfig,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "DRY RUN: no pages will be fetched or written")?;
    writeln!(out, "Found {} unique URLs", urls.len())?;
    writeln!(out, "Would process these URLs:")?;

    for url in urls {
        if config.verbose {
            match locate(url, &config.output_dir) {
                Ok(location) => {
                    writeln!(out, "  {} -> {}", url, location.file_path().display())?
                }
                Err(err) => writeln!(out, "  {} -> {}", url, err)?,
            }
        } else {
            writeln!(out, "  {}", url)?;
        }
    }

    Ok(())
}

/// Download one URL; returns whether a file was written
async fn process_url<W: Write>(
    backend: &dyn Backend,
    url: &str,
    config: &RunConfig,
    out: &mut W,
) -> io::Result<bool> {
    if config.verbose {
        writeln!(out, "Processing: {}", url)?;
    }

    let location = match map_url(url, &config.output_dir) {
        Ok(location) => location,
        Err(err) => {
            warn!(url, error = %err, "Cannot map URL to an output location");
            if config.verbose {
                writeln!(out, "  Failed: {}", err)?;
            }
            return Ok(false);
        }
    };

    let outcome = fetch_and_convert(backend, url, &location).await;
    if config.verbose {
        if outcome.is_saved() {
            writeln!(out, "  {}", outcome)?;
        } else {
            writeln!(out, "  Failed: {}", outcome)?;
        }
    }

    Ok(outcome.is_saved())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::StubBackend;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const SITEMAP: &str = "https://example.com/sitemap.xml";
    const PAGE1: &str = "https://example.com/page1";
    const PAGE2: &str = "https://example.com/page2";

    fn config(dir: &Path, dry_run: bool, verbose: bool) -> RunConfig {
        RunConfig {
            output_dir: dir.to_path_buf(),
            dry_run,
            verbose,
        }
    }

    fn sitemaps(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    async fn run_to_string(
        backend: &StubBackend,
        sitemap_urls: &[&str],
        config: &RunConfig,
    ) -> (RunSummary, String) {
        let mut out = Vec::new();
        let summary = run(backend, &sitemaps(sitemap_urls), config, &mut out)
            .await
            .unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    fn count_markdown_files(dir: &Path) -> usize {
        let mut count = 0;
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                count += count_markdown_files(&path);
            } else if path.extension().is_some_and(|e| e == "md") {
                count += 1;
            }
        }
        count
    }

    #[tokio::test]
    async fn test_dry_run_lists_urls_without_writing() {
        let dir = tempdir().unwrap();
        let backend = StubBackend::new()
            .with_sitemap(SITEMAP, &[PAGE1, PAGE2])
            .with_page(PAGE1, "<p>one</p>")
            .with_page(PAGE2, "<p>two</p>");

        let (summary, output) =
            run_to_string(&backend, &[SITEMAP], &config(dir.path(), true, true)).await;

        assert!(output.contains("DRY RUN"));
        assert!(output.contains("Found 2 unique URLs"));
        assert!(output.contains("Would process these URLs:"));
        assert!(output.contains(PAGE1));
        assert!(output.contains(PAGE2));
        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.succeeded, 0);
        assert!(backend.fetched().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_verbose_shows_planned_paths() {
        let dir = tempdir().unwrap();
        let backend = StubBackend::new().with_sitemap(SITEMAP, &[PAGE1, "not a url"]);

        let (_, output) =
            run_to_string(&backend, &[SITEMAP], &config(dir.path(), true, true)).await;

        let planned = dir.path().join("example.com").join("page1.md");
        assert!(output.contains(&format!("  {} -> {}", PAGE1, planned.display())));
        assert!(output.contains("  not a url -> Invalid URL: not a url"));
    }

    #[tokio::test]
    async fn test_full_run_writes_every_page() {
        let dir = tempdir().unwrap();
        let backend = StubBackend::new()
            .with_sitemap(SITEMAP, &[PAGE1, PAGE2])
            .with_page(PAGE1, "<h1>One</h1>")
            .with_page(PAGE2, "<h1>Two</h1>");

        let (summary, output) =
            run_to_string(&backend, &[SITEMAP], &config(dir.path(), false, true)).await;

        assert!(output.contains("Found 2 unique URLs to process"));
        assert!(output.contains("Successfully processed: 2"));
        assert!(output.contains("Failed: 0"));
        assert_eq!(
            summary,
            RunSummary {
                discovered: 2,
                succeeded: 2,
                failed: 0
            }
        );
        assert_eq!(count_markdown_files(dir.path()), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("example.com").join("page2.md")).unwrap(),
            "# Two"
        );
    }

    #[tokio::test]
    async fn test_urls_processed_in_sorted_order() {
        let dir = tempdir().unwrap();
        let backend = StubBackend::new().with_sitemap(SITEMAP, &[PAGE2, PAGE1]);

        run_to_string(&backend, &[SITEMAP], &config(dir.path(), false, false)).await;

        assert_eq!(backend.fetched(), vec![PAGE1.to_string(), PAGE2.to_string()]);
    }

    #[tokio::test]
    async fn test_sitemaps_are_merged_and_deduplicated() {
        let dir = tempdir().unwrap();
        let other = "https://example.com/other-sitemap.xml";
        let backend = StubBackend::new()
            .with_sitemap(SITEMAP, &[PAGE1, PAGE2])
            .with_sitemap(other, &[PAGE2, "https://example.com/page3"]);

        let (summary, output) =
            run_to_string(&backend, &[SITEMAP, other], &config(dir.path(), true, false)).await;

        assert_eq!(summary.discovered, 3);
        assert!(output.contains("Found 3 unique URLs"));
    }

    #[tokio::test]
    async fn test_failed_sitemap_contributes_nothing() {
        let dir = tempdir().unwrap();
        let broken = "https://broken.example.com/sitemap.xml";
        let backend = StubBackend::new().with_sitemap(SITEMAP, &[PAGE1]);

        let (summary, output) =
            run_to_string(&backend, &[broken, SITEMAP], &config(dir.path(), true, true)).await;

        assert_eq!(summary.discovered, 1);
        assert!(output.contains(&format!("Processing sitemap: {}\n  Found 0 URLs in sitemap", broken)));
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_run_continues() {
        let dir = tempdir().unwrap();
        let backend = StubBackend::new()
            .with_sitemap(
                SITEMAP,
                &[
                    PAGE1,
                    PAGE2,
                    "https://example.com/empty",
                    "not a url",
                ],
            )
            .with_page(PAGE1, "<p>one</p>")
            .with_page("https://example.com/empty", "<nav>menu only</nav>");

        let (summary, output) =
            run_to_string(&backend, &[SITEMAP], &config(dir.path(), false, true)).await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 3);
        assert!(output.contains("Successfully processed: 1"));
        assert!(output.contains("Failed: 3"));
        assert!(output.contains("  Failed: Failed to fetch content"));
        assert!(output.contains("  Failed: No content could be extracted"));
        assert!(output.contains("  Failed: Invalid URL: not a url"));
        assert_eq!(count_markdown_files(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_directory_creation_failure_counts_as_failure() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("example.com"), "not a directory").unwrap();
        let other = "https://other.example.org/a";
        let backend = StubBackend::new()
            .with_sitemap(SITEMAP, &["https://example.com/blog/post1", other])
            .with_page(other, "<p>fine</p>");

        let (summary, _) =
            run_to_string(&backend, &[SITEMAP], &config(dir.path(), false, false)).await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(dir.path().join("other.example.org").join("a.md").is_file());
    }

    #[tokio::test]
    async fn test_quiet_run_prints_only_report() {
        let dir = tempdir().unwrap();
        let backend = StubBackend::new()
            .with_sitemap(SITEMAP, &[PAGE1])
            .with_page(PAGE1, "<p>one</p>");

        let (_, output) =
            run_to_string(&backend, &[SITEMAP], &config(dir.path(), false, false)).await;

        assert_eq!(
            output,
            "Found 1 unique URLs to process\n\nSuccessfully processed: 1\nFailed: 0\n"
        );
    }

    #[tokio::test]
    async fn test_no_urls_still_succeeds() {
        let dir = tempdir().unwrap();
        let backend = StubBackend::new();

        let (summary, output) =
            run_to_string(&backend, &[SITEMAP], &config(dir.path(), false, false)).await;

        assert_eq!(summary, RunSummary::default());
        assert!(output.contains("Found 0 unique URLs to process"));
        assert!(output.contains("Successfully processed: 0"));
    }

    #[test]
    fn test_run_config_default() {
        let config = RunConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(!config.dry_run);
        assert!(!config.verbose);
    }
}
