// src/models/download.rs

//! Download jobs, task states and their reported outcomes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::basename;

/// A resource to download and where to put it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub url: Url,
    pub destination: PathBuf,
}

impl DownloadJob {
    pub fn new(url: Url, destination: impl Into<PathBuf>) -> Self {
        Self {
            url,
            destination: destination.into(),
        }
    }

    /// Job writing to `<dir>/<basename(url)>`.
    pub fn into_dir(url: Url, dir: impl AsRef<Path>) -> Self {
        let destination = dir.as_ref().join(basename(&url));
        Self { url, destination }
    }
}

/// Lifecycle state of a download task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Paused,
    Stopped,
    Completed,
    Failed { cause: String },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Stopped | TaskState::Completed | TaskState::Failed { .. }
        )
    }

    /// The terminal view of this state, if it is one.
    pub fn terminal(&self) -> Option<TerminalState> {
        match self {
            TaskState::Stopped => Some(TerminalState::Stopped),
            TaskState::Completed => Some(TerminalState::Completed),
            TaskState::Failed { cause } => Some(TerminalState::Failed {
                cause: cause.clone(),
            }),
            TaskState::Running | TaskState::Paused => None,
        }
    }
}

/// How a download ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TerminalState {
    Completed,
    Stopped,
    Failed { cause: String },
}

impl From<TerminalState> for TaskState {
    fn from(state: TerminalState) -> Self {
        match state {
            TerminalState::Completed => TaskState::Completed,
            TerminalState::Stopped => TaskState::Stopped,
            TerminalState::Failed { cause } => TaskState::Failed { cause },
        }
    }
}

/// Per-job result reported by the download pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub url: String,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub state: TerminalState,
    pub bytes_downloaded: u64,
}

impl DownloadOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == TerminalState::Completed
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, TerminalState::Failed { .. })
    }
}

/// Live throughput figures of one task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadStatistics {
    pub bytes_downloaded: u64,
    pub elapsed: Duration,
    /// Smoothed bytes per second; zero unless running
    pub speed: f64,
    /// `None` when the total length or the current speed is unknown
    pub estimated_remaining: Option<Duration>,
}
