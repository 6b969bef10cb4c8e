// src/services/download.rs

//! Controllable single-resource download worker.
//!
//! A [`DownloadTask`] streams one resource to disk on the tokio runtime and
//! can be paused, resumed and stopped from any other task. Control requests
//! are observed between slices of at most `chunk_size` bytes; while paused
//! the worker sleeps on the control channel instead of polling.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::models::{DownloadJob, DownloadOutcome, DownloadStatistics, TaskState, TerminalState};
use crate::services::fetcher::Fetcher;
use crate::utils::fs::part_path;

/// Span over which throughput samples are taken.
const SPEED_WINDOW: Duration = Duration::from_millis(250);
/// Weight of the newest sample in the smoothed speed.
const SPEED_ALPHA: f64 = 0.3;

/// Tunables for a single download.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Largest slice written between two control checkpoints
    pub chunk_size: usize,
    /// Write to `<destination>.part` and rename once complete
    pub atomic: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8 * 1024,
            atomic: false,
        }
    }
}

impl From<&crate::models::DownloadConfig> for DownloadOptions {
    fn from(config: &crate::models::DownloadConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            atomic: config.atomic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Pause,
    Stop,
}

enum Flow {
    Continue,
    Stop,
}

#[derive(Debug)]
struct Progress {
    bytes: u64,
    content_length: Option<u64>,
    speed: Option<f64>,
    window_start: Instant,
    window_bytes: u64,
    paused: bool,
    finished_at: Option<Instant>,
}

/// State read by supervisors while the worker mutates it.
#[derive(Debug)]
struct Shared {
    started_at: Instant,
    progress: Mutex<Progress>,
}

impl Shared {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            progress: Mutex::new(Progress {
                bytes: 0,
                content_length: None,
                speed: None,
                window_start: now,
                window_bytes: 0,
                paused: false,
                finished_at: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_content_length(&self, length: Option<u64>) {
        self.lock().content_length = length;
    }

    fn record(&self, written: usize) {
        let mut p = self.lock();
        if p.finished_at.is_some() {
            return;
        }
        p.bytes += written as u64;
        p.window_bytes += written as u64;

        let now = Instant::now();
        let span = now.duration_since(p.window_start);
        if span >= SPEED_WINDOW {
            let sample = p.window_bytes as f64 / span.as_secs_f64();
            p.speed = Some(match p.speed {
                Some(previous) => SPEED_ALPHA * sample + (1.0 - SPEED_ALPHA) * previous,
                None => sample,
            });
            p.window_start = now;
            p.window_bytes = 0;
        }
    }

    fn set_paused(&self, paused: bool) {
        let mut p = self.lock();
        p.paused = paused;
        if !paused {
            // The paused gap is not part of any throughput sample.
            p.window_start = Instant::now();
            p.window_bytes = 0;
        }
    }

    fn finish(&self) {
        let mut p = self.lock();
        p.finished_at.get_or_insert_with(Instant::now);
    }

    fn bytes(&self) -> u64 {
        self.lock().bytes
    }

    fn statistics(&self) -> DownloadStatistics {
        let p = self.lock();
        let end = p.finished_at.unwrap_or_else(Instant::now);
        let elapsed = end.duration_since(self.started_at);

        let speed = if p.paused || p.finished_at.is_some() {
            0.0
        } else {
            match p.speed {
                Some(speed) => speed,
                None if elapsed.as_secs_f64() > 0.0 => p.bytes as f64 / elapsed.as_secs_f64(),
                None => 0.0,
            }
        };

        let estimated_remaining = p.content_length.and_then(|total| {
            let remaining = total.saturating_sub(p.bytes);
            if remaining == 0 {
                Some(Duration::ZERO)
            } else if speed > 0.0 {
                Some(Duration::from_secs_f64(remaining as f64 / speed))
            } else {
                None
            }
        });

        DownloadStatistics {
            bytes_downloaded: p.bytes,
            elapsed,
            speed,
            estimated_remaining,
        }
    }
}

/// Handle to one running download.
pub struct DownloadTask {
    job: DownloadJob,
    shared: Arc<Shared>,
    control: watch::Sender<Command>,
    state: watch::Receiver<TaskState>,
    handle: JoinHandle<TerminalState>,
}

impl DownloadTask {
    /// Start downloading `job` immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(job: DownloadJob, fetcher: Arc<dyn Fetcher>, options: DownloadOptions) -> Self {
        let shared = Arc::new(Shared::new());
        let (control_tx, control_rx) = watch::channel(Command::Run);
        let (state_tx, state_rx) = watch::channel(TaskState::Running);

        let worker = Worker {
            job: job.clone(),
            fetcher,
            options,
            shared: Arc::clone(&shared),
            control: control_rx,
            state: state_tx,
        };
        let handle = tokio::spawn(worker.run());

        Self {
            job,
            shared,
            control: control_tx,
            state: state_rx,
            handle,
        }
    }

    pub fn job(&self) -> &DownloadJob {
        &self.job
    }

    /// Ask the worker to pause at the next slice boundary.
    pub fn pause(&self) {
        self.control.send_if_modified(|command| {
            if *command == Command::Run {
                *command = Command::Pause;
                true
            } else {
                false
            }
        });
    }

    /// Undo a pause; no-op unless paused.
    pub fn resume(&self) {
        self.control.send_if_modified(|command| {
            if *command == Command::Pause {
                *command = Command::Run;
                true
            } else {
                false
            }
        });
    }

    /// Ask the worker to stop at the next slice boundary. Written bytes stay.
    pub fn stop(&self) {
        self.control.send_if_modified(|command| {
            if *command == Command::Stop {
                false
            } else {
                *command = Command::Stop;
                true
            }
        });
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Consistent snapshot of progress figures.
    pub fn statistics(&self) -> DownloadStatistics {
        self.shared.statistics()
    }

    /// Wait until the task reaches a terminal state.
    pub async fn wait(&self) -> TerminalState {
        let mut state = self.state.clone();
        let terminal = match state.wait_for(TaskState::is_terminal).await {
            Ok(current) => current.terminal(),
            Err(_) => None,
        };
        terminal.unwrap_or_else(|| TerminalState::Failed {
            cause: "download worker ended unexpectedly".to_string(),
        })
    }

    /// Wait for the worker and report its outcome.
    pub async fn join(self) -> DownloadOutcome {
        let state = match self.handle.await {
            Ok(state) => state,
            Err(e) => TerminalState::Failed {
                cause: AppError::Task(e.to_string()).to_string(),
            },
        };
        DownloadOutcome {
            url: self.job.url.to_string(),
            destination: self.job.destination.clone(),
            state,
            bytes_downloaded: self.shared.bytes(),
        }
    }
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("job", &self.job)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct Worker {
    job: DownloadJob,
    fetcher: Arc<dyn Fetcher>,
    options: DownloadOptions,
    shared: Arc<Shared>,
    control: watch::Receiver<Command>,
    state: watch::Sender<TaskState>,
}

impl Worker {
    async fn run(mut self) -> TerminalState {
        let terminal = self.transfer().await;
        self.shared.finish();

        match &terminal {
            TerminalState::Completed => log::info!(
                "Downloaded {} to {} ({} bytes)",
                self.job.url,
                self.job.destination.display(),
                self.shared.bytes()
            ),
            TerminalState::Stopped => log::info!(
                "Stopped {} after {} bytes",
                self.job.url,
                self.shared.bytes()
            ),
            TerminalState::Failed { cause } => {
                log::warn!("Download of {} failed: {}", self.job.url, cause)
            }
        }

        self.state.send_replace(terminal.clone().into());
        terminal
    }

    async fn transfer(&mut self) -> TerminalState {
        let fetched = match self.fetcher.fetch_stream(&self.job.url).await {
            Ok(fetched) => fetched,
            Err(e) => return failed(e),
        };
        self.shared.set_content_length(fetched.content_length);
        let mut chunks = fetched.chunks;

        let target = if self.options.atomic {
            part_path(&self.job.destination)
        } else {
            self.job.destination.clone()
        };
        let mut file = match File::create(&target).await {
            Ok(file) => file,
            Err(e) => return failed(AppError::Io(e)),
        };

        let chunk_size = self.options.chunk_size.max(1);
        while let Some(next) = chunks.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = file.flush().await;
                    return failed(e);
                }
            };

            for piece in chunk.chunks(chunk_size) {
                if let Flow::Stop = self.checkpoint(&mut file).await {
                    drop(chunks);
                    return match file.flush().await {
                        Ok(()) => TerminalState::Stopped,
                        Err(e) => failed(AppError::Io(e)),
                    };
                }
                if let Err(e) = file.write_all(piece).await {
                    return failed(AppError::Io(e));
                }
                self.shared.record(piece.len());
            }
        }

        if let Err(e) = file.flush().await {
            return failed(AppError::Io(e));
        }
        drop(file);

        if self.options.atomic {
            if let Err(e) = commit(&target, &self.job.destination).await {
                return failed(e);
            }
        }
        TerminalState::Completed
    }

    /// Observe pending control requests before writing the next slice.
    async fn checkpoint(&mut self, file: &mut File) -> Flow {
        let command = *self.control.borrow_and_update();
        match command {
            Command::Run => Flow::Continue,
            Command::Stop => Flow::Stop,
            Command::Pause => {
                if let Err(e) = file.flush().await {
                    log::warn!("Flush before pause failed for {}: {}", self.job.url, e);
                }
                self.shared.set_paused(true);
                self.state.send_replace(TaskState::Paused);
                log::debug!("Paused {}", self.job.url);

                let next = match self.control.wait_for(|c| *c != Command::Pause).await {
                    Ok(command) => *command,
                    // Handle dropped: nobody can resume us.
                    Err(_) => Command::Stop,
                };
                self.shared.set_paused(false);
                match next {
                    Command::Run => {
                        self.state.send_replace(TaskState::Running);
                        log::debug!("Resumed {}", self.job.url);
                        Flow::Continue
                    }
                    Command::Pause | Command::Stop => Flow::Stop,
                }
            }
        }
    }
}

fn failed(err: impl Into<AppError>) -> TerminalState {
    TerminalState::Failed {
        cause: err.into().to_string(),
    }
}

async fn commit(part: &Path, destination: &Path) -> crate::error::Result<()> {
    tokio::fs::rename(part, destination).await?;
    Ok(())
}
