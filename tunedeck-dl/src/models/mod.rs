//! Core data types for the downloader

pub mod metadata;
pub mod reference;
pub mod task;

pub use metadata::{ExtractedFields, GenreResult, GenreSource, ResolvedMetadata};
pub use reference::MediaReference;
pub use task::{DownloadSource, DownloadTask, TaskState, TaskTransition};
