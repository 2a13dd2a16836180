//! In-memory task tracker
//!
//! Owns every task's current snapshot plus its cancellation token.
//! Mutations go through short-lived write locks; readers get cloned
//! snapshots so poll handlers never hold the map across an await.
//! Terminal tasks linger for a retention window so late polls still
//! see the outcome, then a periodic sweep drops them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tunedeck_common::events::{DeckEvent, EventBus};

use crate::models::{DownloadTask, TaskState, TaskTransition};

pub struct TaskTracker {
    tasks: RwLock<HashMap<Uuid, DownloadTask>>,
    cancel_tokens: RwLock<HashMap<Uuid, CancellationToken>>,
    retention: Duration,
    event_bus: Arc<EventBus>,
}

impl TaskTracker {
    pub fn new(retention: Duration, event_bus: Arc<EventBus>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            cancel_tokens: RwLock::new(HashMap::new()),
            retention,
            event_bus,
        }
    }

    /// Register a new task and its cancellation token.
    pub fn insert(&self, task: DownloadTask) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut tokens) = self.cancel_tokens.write() {
            tokens.insert(task.task_id, token.clone());
        }
        if let Ok(mut tasks) = self.tasks.write() {
            tasks.insert(task.task_id, task);
        }
        token
    }

    pub fn snapshot(&self, task_id: Uuid) -> Option<DownloadTask> {
        self.tasks.read().ok()?.get(&task_id).cloned()
    }

    pub fn all(&self) -> Vec<DownloadTask> {
        match self.tasks.read() {
            Ok(tasks) => {
                let mut all: Vec<_> = tasks.values().cloned().collect();
                all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                all
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn token_for(&self, task_id: Uuid) -> Option<CancellationToken> {
        self.cancel_tokens.read().ok()?.get(&task_id).cloned()
    }

    /// Any non-terminal task already working on this reference?
    pub fn is_active_for(&self, video_id: &str) -> bool {
        self.active_task_for(video_id).is_some()
    }

    pub fn active_task_for(&self, video_id: &str) -> Option<DownloadTask> {
        let tasks = self.tasks.read().ok()?;
        tasks
            .values()
            .find(|t| !t.state.is_terminal() && t.reference.video_id == video_id)
            .cloned()
    }

    /// Apply a closure to a task under the write lock.
    pub fn update<F>(&self, task_id: Uuid, f: F)
    where
        F: FnOnce(&mut DownloadTask),
    {
        if let Ok(mut tasks) = self.tasks.write() {
            if let Some(task) = tasks.get_mut(&task_id) {
                f(task);
            }
        }
    }

    /// Transition a task, emitting a state-change event. Returns the
    /// transition, or `None` if the task was missing or terminal.
    pub fn transition(&self, task_id: Uuid, new_state: TaskState) -> Option<TaskTransition> {
        let transition = {
            let mut tasks = self.tasks.write().ok()?;
            tasks.get_mut(&task_id)?.transition_to(new_state)?
        };
        self.event_bus.emit_lossy(DeckEvent::TaskStateChanged {
            task_id,
            old_state: transition.old_state.as_str().to_string(),
            new_state: transition.new_state.as_str().to_string(),
            timestamp: transition.transitioned_at,
        });
        Some(transition)
    }

    /// Record a transfer progress sample, mapped into overall percent
    /// by the caller.
    pub fn set_transfer(
        &self,
        task_id: Uuid,
        percent: u8,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    ) {
        let mut emitted_percent = None;
        if let Ok(mut tasks) = self.tasks.write() {
            if let Some(task) = tasks.get_mut(&task_id) {
                task.downloaded_bytes = downloaded_bytes;
                if total_bytes.is_some() {
                    task.total_bytes = total_bytes;
                }
                task.raise_progress(percent);
                emitted_percent = Some(task.progress_percent);
            }
        }
        if let Some(percent) = emitted_percent {
            self.event_bus.emit_lossy(DeckEvent::TaskProgress {
                task_id,
                percent,
                downloaded_bytes,
                total_bytes,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    pub fn raise_progress(&self, task_id: Uuid, percent: u8) {
        self.update(task_id, |task| task.raise_progress(percent));
    }

    /// Cancel a task. Queued tasks flip to Cancelled immediately;
    /// running tasks get their token cancelled and finish through the
    /// pipeline's own cancellation checks. Returns false for unknown
    /// or already-terminal tasks.
    pub fn cancel(&self, task_id: Uuid) -> bool {
        let current = match self.snapshot(task_id) {
            Some(task) => task,
            None => return false,
        };
        if current.state.is_terminal() {
            return false;
        }
        if let Some(token) = self.token_for(task_id) {
            token.cancel();
        }
        if current.state == TaskState::Queued {
            self.transition(task_id, TaskState::Cancelled);
        }
        true
    }

    /// Drop terminal tasks whose retention window has passed.
    pub fn sweep(&self) {
        let cutoff = chrono::Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::zero());
        let mut removed = Vec::new();
        if let Ok(mut tasks) = self.tasks.write() {
            tasks.retain(|task_id, task| {
                let expired = task.state.is_terminal()
                    && task.ended_at.map(|t| t < cutoff).unwrap_or(false);
                if expired {
                    removed.push(*task_id);
                }
                !expired
            });
        }
        if !removed.is_empty() {
            if let Ok(mut tokens) = self.cancel_tokens.write() {
                for task_id in &removed {
                    tokens.remove(task_id);
                }
            }
            tracing::debug!("swept {} finished tasks", removed.len());
        }
    }

    /// Background sweep loop, one pass per minute.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                tracker.sweep();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DownloadSource, MediaReference};

    fn tracker() -> TaskTracker {
        TaskTracker::new(Duration::from_secs(900), Arc::new(EventBus::new(64)))
    }

    fn task(video_id: &str) -> DownloadTask {
        DownloadTask::new(
            MediaReference::from_video_id(video_id).unwrap(),
            DownloadSource::Direct,
        )
    }

    #[tokio::test]
    async fn insert_and_snapshot() {
        let tracker = tracker();
        let t = task("dQw4w9WgXcQ");
        let id = t.task_id;
        tracker.insert(t);
        assert_eq!(tracker.snapshot(id).unwrap().state, TaskState::Queued);
        assert!(tracker.token_for(id).is_some());
    }

    #[tokio::test]
    async fn cancel_queued_is_immediate() {
        let tracker = tracker();
        let t = task("dQw4w9WgXcQ");
        let id = t.task_id;
        let token = tracker.insert(t);
        assert!(tracker.cancel(id));
        assert!(token.is_cancelled());
        assert_eq!(tracker.snapshot(id).unwrap().state, TaskState::Cancelled);
        // Second cancel is a no-op
        assert!(!tracker.cancel(id));
    }

    #[tokio::test]
    async fn cancel_running_only_flags_token() {
        let tracker = tracker();
        let t = task("dQw4w9WgXcQ");
        let id = t.task_id;
        let token = tracker.insert(t);
        tracker.transition(id, TaskState::Downloading);
        assert!(tracker.cancel(id));
        assert!(token.is_cancelled());
        // Pipeline, not the tracker, finishes the transition
        assert_eq!(tracker.snapshot(id).unwrap().state, TaskState::Downloading);
    }

    #[tokio::test]
    async fn active_lookup_ignores_terminal_tasks() {
        let tracker = tracker();
        let t = task("dQw4w9WgXcQ");
        let id = t.task_id;
        tracker.insert(t);
        assert!(tracker.is_active_for("dQw4w9WgXcQ"));
        tracker.transition(id, TaskState::Error);
        assert!(!tracker.is_active_for("dQw4w9WgXcQ"));
    }

    #[tokio::test]
    async fn sweep_drops_expired_terminal_tasks() {
        let tracker = TaskTracker::new(Duration::from_secs(0), Arc::new(EventBus::new(64)));
        let t = task("dQw4w9WgXcQ");
        let id = t.task_id;
        tracker.insert(t);
        tracker.transition(id, TaskState::Completed);

        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.sweep();
        assert!(tracker.snapshot(id).is_none());
        assert!(tracker.token_for(id).is_none());
    }

    #[tokio::test]
    async fn sweep_keeps_active_tasks() {
        let tracker = TaskTracker::new(Duration::from_secs(0), Arc::new(EventBus::new(64)));
        let t = task("dQw4w9WgXcQ");
        let id = t.task_id;
        tracker.insert(t);
        tracker.sweep();
        assert!(tracker.snapshot(id).is_some());
    }

    #[tokio::test]
    async fn transition_emits_event() {
        let bus = Arc::new(EventBus::new(64));
        let tracker = TaskTracker::new(Duration::from_secs(900), bus.clone());
        let mut rx = bus.subscribe();
        let t = task("dQw4w9WgXcQ");
        let id = t.task_id;
        tracker.insert(t);
        tracker.transition(id, TaskState::FetchingInfo);
        match rx.recv().await.unwrap() {
            DeckEvent::TaskStateChanged { old_state, new_state, .. } => {
                assert_eq!(old_state, "queued");
                assert_eq!(new_state, "fetching_info");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
