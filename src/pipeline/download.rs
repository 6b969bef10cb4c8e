// src/pipeline/download.rs

//! Resource download pipeline.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;
use crate::models::{Config, DownloadJob, DownloadOutcome};
use crate::services::{DownloadOptions, DownloadPool, Fetcher};
use crate::utils::{basename, fs::ensure_dir};

/// Download `urls` into `destination` with the configured parallelism.
///
/// Duplicate URLs are downloaded once; URLs sharing a file name get a
/// numbered suffix so no two jobs write the same file.
pub async fn run_downloads(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    urls: Vec<Url>,
    destination: &Path,
    cancel: CancellationToken,
) -> Result<Vec<DownloadOutcome>> {
    let jobs = plan_jobs(urls, destination);
    if jobs.is_empty() {
        log::info!("Nothing to download");
        return Ok(Vec::new());
    }
    ensure_dir(destination).await?;

    DownloadPool::new(fetcher, DownloadOptions::from(&config.download))
        .with_progress(config.download.progress_interval())
        .with_cancellation(cancel)
        .run(jobs, config.download.max_parallel)
        .await
}

/// One job per distinct URL, each with its own file name.
pub fn plan_jobs(urls: Vec<Url>, destination: &Path) -> Vec<DownloadJob> {
    let mut seen_urls = HashSet::new();
    let mut taken = HashSet::new();
    let mut jobs = Vec::new();

    for url in urls {
        if !seen_urls.insert(url.to_string()) {
            continue;
        }
        let name = unique_name(&basename(&url), &mut taken);
        jobs.push(DownloadJob::new(url, destination.join(name)));
    }
    jobs
}

fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        })
        .find(|candidate| taken.insert(candidate.clone()))
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::testing::FakeFetcher;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn urls(list: &[&str]) -> Vec<Url> {
        list.iter().map(|s| Url::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_plan_jobs_dedups_and_disambiguates() {
        let jobs = plan_jobs(
            urls(&[
                "https://a.test/img/logo.png",
                "https://a.test/img/logo.png",
                "https://b.test/logo.png",
                "https://c.test/logo.png",
                "https://a.test/",
                "https://b.test/",
            ]),
            Path::new("out"),
        );

        let destinations: Vec<PathBuf> = jobs.into_iter().map(|j| j.destination).collect();
        assert_eq!(
            destinations,
            vec![
                PathBuf::from("out/logo.png"),
                PathBuf::from("out/logo-1.png"),
                PathBuf::from("out/logo-2.png"),
                PathBuf::from("out/index.html"),
                PathBuf::from("out/index-1.html"),
            ]
        );
    }

    #[test]
    fn test_unique_name_without_extension() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("README", &mut taken), "README");
        assert_eq!(unique_name("README", &mut taken), "README-1");
        assert_eq!(unique_name(".hidden", &mut taken), ".hidden");
        assert_eq!(unique_name(".hidden", &mut taken), ".hidden-1");
    }

    #[tokio::test]
    async fn test_run_downloads_creates_destination() {
        let tmp = TempDir::new().unwrap();
        let destination = tmp.path().join("static").join("images");
        let fetcher = Arc::new(
            FakeFetcher::new().resource("http://files.test/a.png", 2, 16, Duration::ZERO),
        );

        let outcomes = run_downloads(
            &Config::default(),
            fetcher,
            urls(&["http://files.test/a.png", "http://files.test/missing.png"]),
            &destination,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcomes[0].is_completed());
        assert!(outcomes[1].is_failed());
        assert_eq!(std::fs::read(destination.join("a.png")).unwrap().len(), 32);
    }

    #[tokio::test]
    async fn test_run_downloads_rejects_zero_parallelism() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.download.max_parallel = 0;

        let result = run_downloads(
            &config,
            Arc::new(FakeFetcher::new()),
            urls(&["http://files.test/a.png"]),
            tmp.path(),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_downloads_without_urls_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let destination = tmp.path().join("never");

        let outcomes = run_downloads(
            &Config::default(),
            Arc::new(FakeFetcher::new()),
            Vec::new(),
            &destination,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcomes.is_empty());
        assert!(!destination.exists());
    }
}
