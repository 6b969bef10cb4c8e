// src/models/record.rs

//! Extraction results and the visited-set of a traversal.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// One extraction result, produced once per visited page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// URL as it was requested
    pub source_url: String,

    /// URL after redirects; links are resolved against this
    pub final_url: String,

    /// Link hops from the traversal's start page
    pub depth: u32,

    /// Anchor targets in document order
    #[serde(default)]
    pub links: Vec<String>,

    /// Image sources in document order
    #[serde(default)]
    pub images: Vec<String>,

    /// Set when a traversal or pipeline hands the record out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CrawlRecord {
    /// A record with no links or images.
    pub fn empty(source_url: &Url) -> Self {
        Self {
            source_url: source_url.to_string(),
            final_url: source_url.to_string(),
            depth: 0,
            links: Vec::new(),
            images: Vec::new(),
            fetched_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.images.is_empty()
    }
}

/// URLs already crawled in one traversal.
///
/// Identity is string equality on the absolute URL with its fragment removed.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalised key used for identity.
    pub fn key(url: &Url) -> String {
        let mut url = url.clone();
        url.set_fragment(None);
        url.into()
    }

    /// Insert `url`, returning `false` if it was already present.
    pub fn insert(&mut self, url: &Url) -> bool {
        self.urls.insert(Self::key(url))
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.urls.contains(&Self::key(url))
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}
