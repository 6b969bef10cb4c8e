// src/services/crawler.rs

//! Depth-bounded, depth-first link traversal.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;
use crate::models::{CrawlRecord, CrawlerConfig, VisitedSet};
use crate::services::extractor::ContentExtractor;
use crate::services::fetcher::Fetcher;
use crate::utils::{is_http, same_host};

/// Per-traversal settings.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Deepest link distance fetched; negative crawls nothing
    pub max_depth: i32,
    /// Keep anchor targets in emitted records
    pub extract_links: bool,
    /// Keep image sources in emitted records
    pub extract_images: bool,
    /// Only follow links on the start page's host
    pub same_host_only: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            extract_links: config.extract_links,
            extract_images: config.extract_images,
            same_host_only: config.same_host_only,
        }
    }
}

/// Fetches pages and walks their links.
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    extractor: ContentExtractor,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            extractor: ContentExtractor::new()?,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop traversals at their next step once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Start a traversal with a fresh visited-set.
    pub fn crawl(&self, start: Url, options: CrawlOptions) -> Traversal<'_> {
        self.crawl_with_visited(start, options, VisitedSet::new())
    }

    /// Start a traversal that skips everything already in `visited`.
    pub fn crawl_with_visited(
        &self,
        start: Url,
        options: CrawlOptions,
        visited: VisitedSet,
    ) -> Traversal<'_> {
        log::info!("Crawling {} (max depth {})", start, options.max_depth);
        Traversal {
            crawler: self,
            start_host: start.clone(),
            stack: vec![(start, 0)],
            visited,
            options,
            emitted: 0,
            failures: 0,
        }
    }
}

/// One run of the crawler; yields records lazily in pre-order.
///
/// Owns its visited-set for the whole run. Pages are visited one at a time.
pub struct Traversal<'a> {
    crawler: &'a Crawler,
    start_host: Url,
    stack: Vec<(Url, i32)>,
    visited: VisitedSet,
    options: CrawlOptions,
    emitted: usize,
    failures: usize,
}

impl Traversal<'_> {
    /// Visit pages until one yields a record, or the traversal is exhausted.
    pub async fn next_record(&mut self) -> Option<CrawlRecord> {
        while let Some((url, depth)) = self.stack.pop() {
            if self.crawler.cancel.is_cancelled() {
                log::info!("Crawl cancelled with {} page(s) pending", self.stack.len() + 1);
                self.stack.clear();
                return None;
            }
            if depth > self.options.max_depth {
                continue;
            }
            if !self.visited.insert(&url) {
                log::debug!("Skipping already visited URL: {}", url);
                continue;
            }

            log::info!("Crawling [depth {}]: {}", depth, url);
            let page = match self.crawler.fetcher.fetch_whole(&url).await {
                Ok(page) => page,
                Err(e) => {
                    self.failures += 1;
                    log::warn!("{}", e);
                    continue;
                }
            };
            if page.final_url != url && !self.visited.insert(&page.final_url) {
                log::debug!("{} redirected to visited {}; skipping", url, page.final_url);
                continue;
            }

            let mut record = if page.is_html() {
                self.crawler
                    .extractor
                    .extract(&page.final_url, &page.body, true, self.options.extract_images)
            } else {
                log::debug!("Not extracting from non-HTML {}", page.final_url);
                CrawlRecord::empty(&page.final_url)
            };

            // Children go on the stack in reverse so the first link is visited first.
            if depth < self.options.max_depth {
                for link in record.links.iter().rev() {
                    if let Some(next) = self.follow(link) {
                        self.stack.push((next, depth + 1));
                    }
                }
            }

            record.source_url = url.to_string();
            record.final_url = page.final_url.to_string();
            record.depth = depth.unsigned_abs();
            record.fetched_at = Some(Utc::now());
            if !self.options.extract_links {
                record.links.clear();
            }
            self.emitted += 1;
            return Some(record);
        }
        None
    }

    /// Drain the traversal into a vector.
    pub async fn collect(mut self) -> Vec<CrawlRecord> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await {
            records.push(record);
        }
        records
    }

    /// Link target worth pushing, if any.
    fn follow(&self, link: &str) -> Option<Url> {
        let url = Url::parse(link).ok()?;
        if !is_http(&url) || self.visited.contains(&url) {
            return None;
        }
        if self.options.same_host_only && !same_host(&url, &self.start_host) {
            return None;
        }
        Some(url)
    }

    /// Records emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Pages whose fetch failed so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    /// End the traversal, handing back its visited-set.
    pub fn into_visited(self) -> VisitedSet {
        self.visited
    }
}
