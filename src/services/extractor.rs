// src/services/extractor.rs

//! Link and image extraction from fetched pages.

use std::borrow::Cow;

use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CrawlRecord;
use crate::utils::resolve;

/// Extracts absolute link and image URLs from HTML.
///
/// Parsing is best-effort: broken markup never aborts extraction, tags
/// without a usable attribute are skipped.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    anchors: Selector,
    images: Selector,
}

impl ContentExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            anchors: Self::parse_selector("a[href]")?,
            images: Self::parse_selector("img[src]")?,
        })
    }

    /// Extract from a raw body.
    ///
    /// Bytes that are not UTF-8 are replaced, so legacy single-byte pages
    /// keep their markup. A binary body yields an empty record.
    pub fn extract(
        &self,
        page_url: &Url,
        body: &[u8],
        want_links: bool,
        want_images: bool,
    ) -> CrawlRecord {
        match decode(body) {
            Ok(text) => self.extract_text(page_url, &text, want_links, want_images),
            Err(e) => {
                let err = AppError::parse(format!("{page_url}: {e}"));
                log::debug!("{err}; nothing extracted");
                CrawlRecord::empty(page_url)
            }
        }
    }

    /// Extract from already decoded HTML.
    pub fn extract_text(
        &self,
        page_url: &Url,
        html: &str,
        want_links: bool,
        want_images: bool,
    ) -> CrawlRecord {
        let mut record = CrawlRecord::empty(page_url);
        if html.trim().is_empty() || !(want_links || want_images) {
            return record;
        }

        let document = Html::parse_document(html);
        if want_links {
            record.links = Self::collect(&document, &self.anchors, "href", page_url);
        }
        if want_images {
            record.images = Self::collect(&document, &self.images, "src", page_url);
        }

        log::debug!(
            "Extracted {} links and {} images from {}",
            record.links.len(),
            record.images.len(),
            page_url
        );
        record
    }

    fn collect(document: &Html, selector: &Selector, attr: &str, base: &Url) -> Vec<String> {
        document
            .select(selector)
            .filter_map(|element| element.value().attr(attr))
            .filter_map(|value| match resolve(base, value) {
                Some(url) => Some(url.to_string()),
                None => {
                    log::debug!("Skipping unresolvable {attr} '{value}' on {base}");
                    None
                }
            })
            .collect()
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

/// Best-effort text view of a body; NUL bytes mark it as binary.
fn decode(body: &[u8]) -> std::result::Result<Cow<'_, str>, &'static str> {
    if body.contains(&0) {
        return Err("body is binary, not text");
    }
    Ok(String::from_utf8_lossy(body))
}
