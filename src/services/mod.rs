//! Service layer for the harvester.
//!
//! This module contains the engine:
//! - Page fetching (`Fetcher`, `HttpFetcher`)
//! - Link and image extraction (`ContentExtractor`)
//! - Recursive traversal (`Crawler`)
//! - Controllable downloads (`DownloadTask`) and their pool (`DownloadPool`)

mod crawler;
mod download;
mod extractor;
mod fetcher;
mod pool;
#[cfg(test)]
pub(crate) mod testing;

pub use crawler::{CrawlOptions, Crawler, Traversal};
pub use download::{DownloadOptions, DownloadTask};
pub use extractor::ContentExtractor;
pub use fetcher::{ChunkStream, FetchedPage, FetchedStream, Fetcher, HttpFetcher};
pub use pool::DownloadPool;
