//! Pipeline entry points for harvester operations.
//!
//! - `run_extract`: Extract links and images from a single page
//! - `run_crawl`: Recursively crawl from a start page
//! - `run_downloads`: Download a set of resources in parallel

pub mod crawl;
pub mod download;

pub use crawl::{run_crawl, run_extract};
pub use download::{plan_jobs, run_downloads};
