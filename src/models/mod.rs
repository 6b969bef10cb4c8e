// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod download;
mod record;
mod summary;

// Re-export all public types
pub use config::{Config, CrawlerConfig, DownloadConfig, OutputConfig};
pub use download::{
    DownloadJob, DownloadOutcome, DownloadStatistics, TaskState, TerminalState,
};
pub use record::{CrawlRecord, VisitedSet};
pub use summary::RunSummary;
