//! Download task state machine
//!
//! A task progresses through:
//! QUEUED → FETCHING_INFO → DOWNLOADING → POST_PROCESSING → COMPLETED
//! with CANCELLED and ERROR as the other terminal states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MediaReference;

/// Download task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, waiting for a worker
    Queued,
    /// Resolving provider metadata
    FetchingInfo,
    /// Transfer in progress
    Downloading,
    /// Tagging, classification fallback, catalog registration
    PostProcessing,
    /// Finished successfully
    Completed,
    /// Cancelled by user
    Cancelled,
    /// Failed with an error
    Error,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled | TaskState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::FetchingInfo => "fetching_info",
            TaskState::Downloading => "downloading",
            TaskState::PostProcessing => "post_processing",
            TaskState::Completed => "completed",
            TaskState::Cancelled => "cancelled",
            TaskState::Error => "error",
        }
    }
}

/// How a download request arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadSource {
    /// Picked from a browsed playlist
    Playlist,
    /// Direct URL submission
    Direct,
    /// Registered from an already-present local file
    Import,
}

impl DownloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadSource::Playlist => "playlist",
            DownloadSource::Direct => "direct",
            DownloadSource::Import => "import",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "playlist" => Some(DownloadSource::Playlist),
            "direct" => Some(DownloadSource::Direct),
            "import" => Some(DownloadSource::Import),
            _ => None,
        }
    }
}

/// State transition record, emitted alongside events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTransition {
    pub task_id: Uuid,
    pub old_state: TaskState,
    pub new_state: TaskState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory download task (tracker-owned)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub task_id: Uuid,
    pub reference: MediaReference,
    pub source: DownloadSource,
    pub state: TaskState,
    /// Overall progress, 0..=100, monotonically non-decreasing
    pub progress_percent: u8,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    /// Display title, filled once metadata resolves
    pub title: Option<String>,
    pub error_message: Option<String>,
    /// Final library path, set on completion
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl DownloadTask {
    pub fn new(reference: MediaReference, source: DownloadSource) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            reference,
            source,
            state: TaskState::Queued,
            progress_percent: 0,
            downloaded_bytes: 0,
            total_bytes: None,
            title: None,
            error_message: None,
            file_path: None,
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state, freezing terminal states.
    ///
    /// Returns `None` if the task is already terminal; terminal tasks
    /// never change state again (a cancel racing a completion keeps
    /// whichever state landed first).
    pub fn transition_to(&mut self, new_state: TaskState) -> Option<TaskTransition> {
        if self.state.is_terminal() {
            return None;
        }
        let transition = TaskTransition {
            task_id: self.task_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Some(transition)
    }

    /// Raise overall progress. Values below the current mark are
    /// ignored so progress never moves backwards across stages.
    pub fn raise_progress(&mut self, percent: u8) {
        let clamped = percent.min(100);
        if clamped > self.progress_percent {
            self.progress_percent = clamped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> DownloadTask {
        let reference = MediaReference::from_video_id("dQw4w9WgXcQ").unwrap();
        DownloadTask::new(reference, DownloadSource::Direct)
    }

    #[test]
    fn new_task_is_queued() {
        let t = task();
        assert_eq!(t.state, TaskState::Queued);
        assert_eq!(t.progress_percent, 0);
        assert!(t.ended_at.is_none());
    }

    #[test]
    fn terminal_states_freeze() {
        let mut t = task();
        t.transition_to(TaskState::FetchingInfo).unwrap();
        t.transition_to(TaskState::Completed).unwrap();
        assert!(t.ended_at.is_some());
        assert!(t.transition_to(TaskState::Cancelled).is_none());
        assert_eq!(t.state, TaskState::Completed);
    }

    #[test]
    fn cancel_after_error_keeps_error() {
        let mut t = task();
        t.transition_to(TaskState::Error).unwrap();
        assert!(t.transition_to(TaskState::Cancelled).is_none());
        assert_eq!(t.state, TaskState::Error);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut t = task();
        t.raise_progress(40);
        t.raise_progress(20);
        assert_eq!(t.progress_percent, 40);
        t.raise_progress(200);
        assert_eq!(t.progress_percent, 100);
    }

    #[test]
    fn transition_reports_old_and_new() {
        let mut t = task();
        let tr = t.transition_to(TaskState::Downloading).unwrap();
        assert_eq!(tr.old_state, TaskState::Queued);
        assert_eq!(tr.new_state, TaskState::Downloading);
    }
}
