// src/models/summary.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::DownloadOutcome;

/// What one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub start_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records handed to the sink
    pub pages: usize,
    /// Pages that could not be fetched
    pub failures: usize,
    pub links: usize,
    pub images: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<DownloadOutcome>,
}

impl RunSummary {
    pub fn new(start_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            start_url: start_url.into(),
            started_at: now,
            finished_at: now,
            pages: 0,
            failures: 0,
            links: 0,
            images: 0,
            downloads: Vec::new(),
        }
    }

    pub fn downloads_failed(&self) -> usize {
        self.downloads.iter().filter(|o| o.is_failed()).count()
    }

    pub fn downloads_completed(&self) -> usize {
        self.downloads.iter().filter(|o| o.is_completed()).count()
    }
}
