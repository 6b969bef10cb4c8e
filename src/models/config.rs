//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Download worker settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Where extracted records are written
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::config("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::config("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.connect_timeout_secs == 0 {
            return Err(AppError::config("crawler.connect_timeout_secs must be > 0"));
        }
        if self.download.max_parallel == 0 {
            return Err(AppError::config("download.max_parallel must be > 0"));
        }
        if self.download.chunk_size == 0 {
            return Err(AppError::config("download.chunk_size must be > 0"));
        }
        if self.download.destination_dir.as_os_str().is_empty() {
            return Err(AppError::config("download.destination_dir is empty"));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds (idle timeout for streamed bodies)
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum link depth followed from the start page
    #[serde(default = "defaults::max_depth")]
    pub max_depth: i32,

    /// Record anchor targets
    #[serde(default = "defaults::enabled")]
    pub extract_links: bool,

    /// Record image sources
    #[serde(default)]
    pub extract_images: bool,

    /// Only follow links on the start page's host
    #[serde(default)]
    pub same_host_only: bool,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
            max_depth: defaults::max_depth(),
            extract_links: defaults::enabled(),
            extract_images: false,
            same_host_only: false,
        }
    }
}

/// Download worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Number of downloads allowed in flight at once
    #[serde(default = "defaults::max_parallel")]
    pub max_parallel: usize,

    /// Largest slice written between two control checkpoints
    #[serde(default = "defaults::chunk_size")]
    pub chunk_size: usize,

    /// Directory downloaded resources are written into
    #[serde(default = "defaults::destination_dir")]
    pub destination_dir: PathBuf,

    /// Write to `<name>.part` and rename once complete
    #[serde(default)]
    pub atomic: bool,

    /// How often running downloads report progress (0 disables)
    #[serde(default = "defaults::progress_interval")]
    pub progress_interval_ms: u64,
}

impl DownloadConfig {
    pub fn progress_interval(&self) -> Option<Duration> {
        (self.progress_interval_ms > 0).then(|| Duration::from_millis(self.progress_interval_ms))
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_parallel: defaults::max_parallel(),
            chunk_size: defaults::chunk_size(),
            destination_dir: defaults::destination_dir(),
            atomic: false,
            progress_interval_ms: defaults::progress_interval(),
        }
    }
}

/// Record output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// CSV file receiving flattened link/image rows
    #[serde(default = "defaults::csv_path")]
    pub csv_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: defaults::csv_path(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        concat!("Mozilla/5.0 (compatible; webharvest/", env!("CARGO_PKG_VERSION"), ")").into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn connect_timeout() -> u64 {
        10
    }
    pub fn max_depth() -> i32 {
        2
    }
    pub fn enabled() -> bool {
        true
    }

    // Download defaults
    pub fn max_parallel() -> usize {
        5
    }
    pub fn chunk_size() -> usize {
        8 * 1024
    }
    pub fn destination_dir() -> PathBuf {
        PathBuf::from("static/images")
    }
    pub fn progress_interval() -> u64 {
        1000
    }

    // Output defaults
    pub fn csv_path() -> PathBuf {
        PathBuf::from("output.csv")
    }
}
