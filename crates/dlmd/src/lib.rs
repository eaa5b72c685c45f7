//! dl-md - download the pages listed in sitemaps as markdown
//!
//! The library behind the `dl-md` command. Given sitemap URLs it collects
//! every page URL they list, fetches each page, extracts its main content as
//! markdown and writes it into a directory tree mirroring host and path:
//! `https://www.example.com/blog/post1` lands in `example.com/blog/post1.md`.
//!
//! ## Backends
//!
//! Network access and content extraction sit behind the [`Backend`] trait.
//! [`HttpBackend`] is the real implementation; tests drive the orchestrator
//! with an in-memory one.
//!
//! ```no_run
//! use dlmd::{run, HttpBackend, HttpOptions, RunConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = HttpBackend::new(HttpOptions::default())?;
//! let config = RunConfig {
//!     output_dir: "docs".into(),
//!     ..Default::default()
//! };
//! let sitemaps = vec!["https://example.com/sitemap.xml".to_string()];
//! let summary = run(&backend, &sitemaps, &config, &mut std::io::stdout()).await?;
//! println!("{} pages saved", summary.succeeded);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod convert;
mod error;
mod layout;
mod page;
mod run;
pub mod sitemap;

pub use backend::{Backend, HttpBackend, HttpOptions};
pub use convert::extract_markdown;
pub use error::{FetchError, LayoutError};
pub use layout::{locate, map_url, OutputLocation};
pub use page::{fetch_and_convert, PageOutcome};
pub use run::{run, RunConfig, RunSummary};
pub use sitemap::resolve_sitemap;

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = concat!("dl-md/", env!("CARGO_PKG_VERSION"));
