//! Bounded download worker pool
//!
//! A fixed set of workers pulls jobs off a bounded queue. A full
//! queue rejects the submission instead of buffering without limit;
//! the API surfaces that as backpressure.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::models::{DownloadSource, MediaReference};
use crate::workflow::pipeline::DownloadPipeline;

/// A queued unit of work.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub task_id: Uuid,
    pub reference: MediaReference,
    pub source: DownloadSource,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The bounded queue is at capacity
    #[error("download queue is full")]
    QueueFull,
    /// Every worker has exited and the queue is closed
    #[error("worker pool is shut down")]
    Shutdown,
}

#[derive(Clone)]
pub struct WorkerPool {
    tx: mpsc::Sender<DownloadJob>,
}

impl WorkerPool {
    /// Spawn `workers` loops sharing one receiver.
    pub fn start(workers: usize, queue_depth: usize, pipeline: Arc<DownloadPipeline>) -> Self {
        let (tx, rx) = mpsc::channel::<DownloadJob>(queue_depth);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => {
                            tracing::debug!("worker {} picked up task {}", worker_id, job.task_id);
                            pipeline.run(job).await;
                        }
                        None => break,
                    }
                }
                tracing::debug!("worker {} shutting down", worker_id);
            });
        }

        Self { tx }
    }

    /// Enqueue without waiting. A saturated queue fails fast; a closed
    /// queue (no workers left) is reported separately.
    pub fn submit(&self, job: DownloadJob) -> Result<(), SubmitError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Shutdown,
        })
    }
}
