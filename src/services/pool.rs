// src/services/pool.rs

//! Bounded pool of concurrent download tasks.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{DownloadJob, DownloadOutcome, TerminalState};
use crate::services::download::{DownloadOptions, DownloadTask};
use crate::services::fetcher::Fetcher;

/// Runs download jobs with at most `max_parallel` in flight.
#[derive(Clone)]
pub struct DownloadPool {
    fetcher: Arc<dyn Fetcher>,
    options: DownloadOptions,
    progress_interval: Option<Duration>,
    cancel: CancellationToken,
}

impl DownloadPool {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: DownloadOptions) -> Self {
        Self {
            fetcher,
            options,
            progress_interval: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Log each running task's statistics every `interval`.
    pub fn with_progress(mut self, interval: Option<Duration>) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Stop running tasks and skip queued ones once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run every job to a terminal state.
    ///
    /// Jobs start in submission order as slots free up; outcomes are returned
    /// in submission order. A failing job never affects its siblings.
    pub async fn run(
        &self,
        jobs: Vec<DownloadJob>,
        max_parallel: usize,
    ) -> Result<Vec<DownloadOutcome>> {
        if max_parallel == 0 {
            return Err(AppError::config("max_parallel must be > 0"));
        }

        let total = jobs.len();
        log::info!("Downloading {} resource(s), {} at a time", total, max_parallel);

        let mut outcomes: Vec<(usize, DownloadOutcome)> = stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| async move { (index, self.supervise(job).await) })
            .buffer_unordered(max_parallel)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let completed = outcomes.iter().filter(|(_, o)| o.is_completed()).count();
        let failed = outcomes.iter().filter(|(_, o)| o.is_failed()).count();
        log::info!(
            "Downloads finished: {} completed, {} failed, {} stopped",
            completed,
            failed,
            total - completed - failed
        );

        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    /// Drive one job from spawn to terminal state.
    async fn supervise(&self, job: DownloadJob) -> DownloadOutcome {
        if self.cancel.is_cancelled() {
            log::debug!("Skipping {}: pool cancelled", job.url);
            return DownloadOutcome {
                url: job.url.to_string(),
                destination: job.destination,
                state: TerminalState::Stopped,
                bytes_downloaded: 0,
            };
        }

        let task = DownloadTask::spawn(job, Arc::clone(&self.fetcher), self.options.clone());

        let stopper = async {
            self.cancel.cancelled().await;
            task.stop();
            std::future::pending::<()>().await
        };
        let reporter = async {
            match self.progress_interval {
                Some(interval) => loop {
                    tokio::time::sleep(interval).await;
                    let stats = task.statistics();
                    let eta = stats
                        .estimated_remaining
                        .map_or_else(|| "unknown".to_string(), |d| format!("{:.1}s", d.as_secs_f64()));
                    log::info!(
                        "{}: {} bytes, {:.1} KiB/s, remaining {}",
                        task.job().url,
                        stats.bytes_downloaded,
                        stats.speed / 1024.0,
                        eta
                    );
                },
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = task.wait() => {}
            _ = stopper => {}
            _ = reporter => {}
        }
        task.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FakeFetcher;
    use tempfile::TempDir;
    use url::Url;

    fn jobs(dir: &TempDir, names: &[&str]) -> Vec<DownloadJob> {
        names
            .iter()
            .map(|name| {
                let url = Url::parse(&format!("http://files.test/{name}")).unwrap();
                DownloadJob::into_dir(url, dir.path())
            })
            .collect()
    }

    fn pool(fetcher: Arc<FakeFetcher>) -> DownloadPool {
        DownloadPool::new(fetcher, DownloadOptions::default())
    }

    #[tokio::test]
    async fn test_rejects_zero_parallelism_before_starting() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new().resource(
            "http://files.test/a.bin",
            1,
            10,
            Duration::ZERO,
        ));

        let result = pool(Arc::clone(&fetcher)).run(jobs(&tmp, &["a.bin"]), 0).await;

        assert!(matches!(result, Err(AppError::Config(_))));
        assert_eq!(fetcher.total_hits(), 0);
    }

    #[tokio::test]
    async fn test_five_jobs_two_parallel_one_failing() {
        let tmp = TempDir::new().unwrap();
        let delay = Duration::from_millis(5);
        let fetcher = Arc::new(
            FakeFetcher::new()
                .resource("http://files.test/1.bin", 6, 10, delay)
                .resource("http://files.test/2.bin", 6, 10, delay)
                .resource("http://files.test/4.bin", 6, 10, delay)
                .resource("http://files.test/5.bin", 6, 10, delay),
        );

        let outcomes = pool(Arc::clone(&fetcher))
            .run(
                jobs(&tmp, &["1.bin", "2.bin", "3.bin", "4.bin", "5.bin"]),
                2,
            )
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 5);
        assert!(outcomes[2].is_failed());
        for i in [0, 1, 3, 4] {
            assert!(outcomes[i].is_completed(), "job {i}: {:?}", outcomes[i]);
            assert_eq!(outcomes[i].bytes_downloaded, 60);
        }
        assert!(fetcher.gauge.peak() <= 2, "peak {}", fetcher.gauge.peak());
        assert_eq!(fetcher.gauge.current(), 0);
    }

    #[tokio::test]
    async fn test_never_exceeds_max_parallel() {
        let tmp = TempDir::new().unwrap();
        let names: Vec<String> = (0..8).map(|i| format!("{i}.bin")).collect();
        let mut fetcher = FakeFetcher::new();
        for name in &names {
            fetcher = fetcher.resource(
                &format!("http://files.test/{name}"),
                4,
                8,
                Duration::from_millis(3),
            );
        }
        let fetcher = Arc::new(fetcher);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let outcomes = pool(Arc::clone(&fetcher)).run(jobs(&tmp, &refs), 3).await.unwrap();

        assert!(outcomes.iter().all(DownloadOutcome::is_completed));
        assert!(fetcher.gauge.peak() <= 3);
        assert!(fetcher.gauge.peak() >= 2, "jobs should overlap");
    }

    #[tokio::test]
    async fn test_outcomes_follow_submission_order() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(
            FakeFetcher::new()
                .resource("http://files.test/slow.bin", 10, 10, Duration::from_millis(5))
                .resource("http://files.test/fast.bin", 1, 10, Duration::ZERO),
        );

        let outcomes = pool(fetcher)
            .run(jobs(&tmp, &["slow.bin", "fast.bin"]), 2)
            .await
            .unwrap();

        assert!(outcomes[0].url.ends_with("slow.bin"));
        assert!(outcomes[1].url.ends_with("fast.bin"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_running_and_skips_queued() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(
            FakeFetcher::new()
                .resource("http://files.test/a.bin", 200, 10, Duration::from_millis(5))
                .resource("http://files.test/b.bin", 200, 10, Duration::from_millis(5)),
        );
        let token = CancellationToken::new();
        let pool = pool(Arc::clone(&fetcher)).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            token.cancel();
        });
        let outcomes = pool
            .run(jobs(&tmp, &["a.bin", "b.bin"]), 1)
            .await
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(outcomes[0].state, TerminalState::Stopped);
        assert!(outcomes[0].bytes_downloaded < 2000);
        assert_eq!(outcomes[1].state, TerminalState::Stopped);
        assert_eq!(outcomes[1].bytes_downloaded, 0);
        assert_eq!(fetcher.hits("http://files.test/b.bin"), 0);
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let outcomes = pool(Arc::new(FakeFetcher::new())).run(Vec::new(), 4).await.unwrap();
        assert!(outcomes.is_empty());
    }
}
