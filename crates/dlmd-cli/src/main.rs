//! dl-md CLI - download the pages listed in sitemaps as markdown

use clap::Parser;
use dlmd::{run, HttpBackend, HttpOptions, RunConfig};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Extract URLs from sitemaps and download each page as markdown
#[derive(Parser, Debug)]
#[command(name = "dl-md")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Sitemap URLs to read
    #[arg(required = true, value_name = "SITEMAP_URLS")]
    sitemap_urls: Vec<String>,

    /// Directory to write markdown files into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// List the URLs that would be processed without fetching them
    #[arg(long)]
    dry_run: bool,

    /// Print progress for every sitemap and page
    #[arg(short, long)]
    verbose: bool,

    /// Custom User-Agent
    #[arg(long)]
    user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            output_dir: self.output_dir.clone(),
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }

    fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let backend = match HttpBackend::new(cli.http_options()) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    debug!(
        sitemaps = cli.sitemap_urls.len(),
        output_dir = %cli.output_dir.display(),
        dry_run = cli.dry_run,
        "Starting dl-md"
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let result = run(&backend, &cli.sitemap_urls, &cli.run_config(), &mut handle).await;

    if let Err(e) = result.and_then(|_| handle.flush()) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr; `RUST_LOG` wins over the verbosity flag
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "dlmd=debug,dl_md=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
