pub mod pipeline;
pub mod pool;
pub mod tracker;

pub use pipeline::DownloadPipeline;
pub use pool::{DownloadJob, SubmitError, WorkerPool};
pub use tracker::TaskTracker;
