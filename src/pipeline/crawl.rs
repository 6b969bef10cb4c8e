// src/pipeline/crawl.rs

//! Single-page extraction and recursive crawl runs.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;
use crate::models::{Config, CrawlRecord, RunSummary};
use crate::pipeline::download::run_downloads;
use crate::services::{ContentExtractor, CrawlOptions, Crawler, Fetcher};
use crate::storage::RecordSink;
use crate::utils::is_http;

/// Fetch one page, hand its record to `sink`, optionally download its images.
///
/// Unlike a crawl, a failed fetch of the page is returned as an error.
pub async fn run_extract(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    url: Url,
    sink: &mut dyn RecordSink,
    download_images: bool,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new(url.as_str());
    let extractor = ContentExtractor::new()?;

    log::info!("Extracting {}", url);
    let page = fetcher.fetch_whole(&url).await?;
    let want_images = config.crawler.extract_images || download_images;
    let mut record = if page.is_html() {
        extractor.extract(
            &page.final_url,
            &page.body,
            config.crawler.extract_links,
            want_images,
        )
    } else {
        log::warn!("{} is not HTML; nothing to extract", page.final_url);
        CrawlRecord::empty(&page.final_url)
    };
    record.source_url = url.to_string();
    record.final_url = page.final_url.to_string();
    record.fetched_at = Some(Utc::now());

    sink.write_record(&record)?;
    sink.finish()?;
    summary.pages = 1;
    summary.links = record.links.len();
    summary.images = record.images.len();

    if download_images {
        let images = image_urls(std::iter::once(&record));
        summary.downloads = run_downloads(
            config,
            fetcher,
            images,
            &config.download.destination_dir,
            cancel,
        )
        .await?;
    }

    summary.finished_at = Utc::now();
    Ok(summary)
}

/// Crawl from `start`, streaming every record to `sink` in emission order.
///
/// Images found along the way are downloaded after the traversal ends when
/// `download_images` is set and the run was not cancelled.
pub async fn run_crawl(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    start: Url,
    sink: &mut dyn RecordSink,
    download_images: bool,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new(start.as_str());
    let mut options = CrawlOptions::from(&config.crawler);
    options.extract_images |= download_images;

    let crawler = Crawler::new(fetcher.clone())?.with_cancellation(cancel.clone());
    let mut traversal = crawler.crawl(start, options);

    let mut images = Vec::new();
    let mut seen_images = HashSet::new();
    while let Some(record) = traversal.next_record().await {
        sink.write_record(&record)?;
        summary.links += record.links.len();
        summary.images += record.images.len();
        for image in image_urls(std::iter::once(&record)) {
            if seen_images.insert(image.to_string()) {
                images.push(image);
            }
        }
    }
    sink.finish()?;

    summary.pages = traversal.emitted();
    summary.failures = traversal.failures();
    log::info!(
        "Crawl finished: {} page(s), {} failed, {} distinct image(s)",
        summary.pages,
        summary.failures,
        images.len()
    );

    if download_images && !cancel.is_cancelled() {
        summary.downloads = run_downloads(
            config,
            fetcher,
            images,
            &config.download.destination_dir,
            cancel,
        )
        .await?;
    }

    summary.finished_at = Utc::now();
    Ok(summary)
}

/// Downloadable image URLs of `records`, in order.
fn image_urls<'a>(records: impl Iterator<Item = &'a CrawlRecord>) -> Vec<Url> {
    records
        .flat_map(|record| record.images.iter())
        .filter_map(|src| Url::parse(src).ok())
        .filter(is_http)
        .collect()
}
