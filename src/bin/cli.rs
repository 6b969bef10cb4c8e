//! webharvest CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use url::Url;
use webharvest::{
    error::{AppError, Result},
    models::{Config, DownloadOutcome, RunSummary},
    pipeline,
    services::{Fetcher, HttpFetcher},
    storage::CsvSink,
};

/// webharvest - Concurrent web crawler and resource downloader
#[derive(Parser, Debug)]
#[command(
    name = "webharvest",
    version,
    about = "Crawl pages, collect links and images, download resources"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "webharvest.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract links and images from a single page
    Extract {
        url: Url,

        /// Keep anchor targets (with --images: keep both)
        #[arg(long)]
        links: bool,

        /// Keep image sources (with --links: keep both)
        #[arg(long)]
        images: bool,

        /// Download every image found on the page
        #[arg(long)]
        download: bool,

        /// Directory receiving downloads (default: download.destination_dir)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// CSV output path (default: output.csv_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Crawl recursively from a start page
    Crawl {
        url: Url,

        /// Maximum link depth (default: crawler.max_depth)
        #[arg(long, allow_negative_numbers = true)]
        max_depth: Option<i32>,

        /// Collect image sources as well as links
        #[arg(long)]
        images: bool,

        /// Download every distinct image found during the crawl
        #[arg(long)]
        download: bool,

        /// Only follow links on the start page's host
        #[arg(long)]
        same_host: bool,

        /// Directory receiving downloads (default: download.destination_dir)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// CSV output path (default: output.csv_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download resources in parallel
    Download {
        #[arg(required = true)]
        urls: Vec<Url>,

        /// Directory receiving downloads (default: download.destination_dir)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Maximum concurrent downloads (default: download.max_parallel)
        #[arg(short, long)]
        parallel: Option<usize>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on Ctrl-C so running traversals and downloads wind down.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping...");
            token.cancel();
        }
    });
}

fn report(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    log::info!(
        "{}: {} page(s), {} failed, {} link(s), {} image(s)",
        summary.start_url,
        summary.pages,
        summary.failures,
        summary.links,
        summary.images
    );
    if !summary.downloads.is_empty() {
        log::info!(
            "Downloads: {} completed, {} failed",
            summary.downloads_completed(),
            summary.downloads_failed()
        );
    }
    Ok(())
}

fn report_downloads(outcomes: &[DownloadOutcome], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcomes)?);
        return Ok(());
    }
    for outcome in outcomes {
        log::info!(
            "{} -> {} ({} bytes)",
            outcome.url,
            outcome.destination.display(),
            outcome.bytes_downloaded
        );
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("webharvest starting...");

    let mut config = Config::load_or_default(&cli.config);

    let cancel = CancellationToken::new();

    match cli.command {
        Command::Extract {
            url,
            links,
            images,
            download,
            dest,
            output,
        } => {
            if links || images {
                config.crawler.extract_links = links;
                config.crawler.extract_images = images;
            }
            if let Some(dest) = dest {
                config.download.destination_dir = dest;
            }
            if let Some(output) = output {
                config.output.csv_path = output;
            }
            config.validate()?;
            cancel_on_ctrl_c(cancel.clone());

            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(&config.crawler)?);
            let mut sink = CsvSink::create(&config.output.csv_path)?;
            let summary =
                pipeline::run_extract(&config, fetcher, url, &mut sink, download, cancel).await?;

            log::info!("Records written to {}", config.output.csv_path.display());
            report(&summary, cli.json)?;
        }

        Command::Crawl {
            url,
            max_depth,
            images,
            download,
            same_host,
            dest,
            output,
        } => {
            if let Some(max_depth) = max_depth {
                config.crawler.max_depth = max_depth;
            }
            config.crawler.extract_images |= images;
            config.crawler.same_host_only |= same_host;
            if let Some(dest) = dest {
                config.download.destination_dir = dest;
            }
            if let Some(output) = output {
                config.output.csv_path = output;
            }
            config.validate()?;
            cancel_on_ctrl_c(cancel.clone());

            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(&config.crawler)?);
            let mut sink = CsvSink::create(&config.output.csv_path)?;
            let summary =
                pipeline::run_crawl(&config, fetcher, url, &mut sink, download, cancel).await?;

            log::info!("Records written to {}", config.output.csv_path.display());
            report(&summary, cli.json)?;
        }

        Command::Download {
            urls,
            dest,
            parallel,
        } => {
            if let Some(dest) = dest {
                config.download.destination_dir = dest;
            }
            if let Some(parallel) = parallel {
                config.download.max_parallel = parallel;
            }
            config.validate()?;
            cancel_on_ctrl_c(cancel.clone());

            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(&config.crawler)?);
            let destination = config.download.destination_dir.clone();
            let outcomes =
                pipeline::run_downloads(&config, fetcher, urls, &destination, cancel).await?;

            report_downloads(&outcomes, cli.json)?;
            let failed = outcomes.iter().filter(|o| o.is_failed()).count();
            if failed > 0 {
                return Err(AppError::Task(format!(
                    "{failed} of {} download(s) failed",
                    outcomes.len()
                )));
            }
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    log::info!("Done!");

    Ok(())
}
