//! Download pipeline orchestration
//!
//! Runs one task end to end: dedup check, metadata resolution, field
//! extraction, genre classification, transfer, post-processing, and
//! catalog registration. Cancellation is checked between phases;
//! within the transfer phase the media service reacts to the token
//! directly.
//!
//! Overall progress windows: resolution 0-20, transfer 20-90,
//! post-processing 90-100.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sqlx::SqlitePool;
use tunedeck_common::events::{DeckEvent, EventBus};

use crate::db::{self, catalog::CatalogEntry, catalog::ConflictKey, catalog::RegisterOutcome, history::HistoryAction};
use crate::models::metadata::decade_from_year;
use crate::models::reference::sanitize_filename;
use crate::models::{ExtractedFields, GenreResult, GenreSource, TaskState};
use crate::services::cache::CacheStore;
use crate::services::executor::{DownloadExecutor, DownloadPlan};
use crate::services::genre::{AudioAnalyzer, ClassifyContext, GenreClassifier, GenreVocabulary};
use crate::services::media::{CredentialProfile, MediaError, TransferProgress};
use crate::services::resolver::MetadataResolver;
use crate::services::tagger;
use crate::workflow::pool::DownloadJob;
use crate::workflow::tracker::TaskTracker;

const UNCLASSIFIED: &str = "Unclassified";

pub struct DownloadPipeline {
    pool: SqlitePool,
    cache: Arc<CacheStore>,
    resolver: MetadataResolver,
    executor: DownloadExecutor,
    classifier: GenreClassifier,
    analyzer: Arc<AudioAnalyzer>,
    tracker: Arc<TaskTracker>,
    event_bus: Arc<EventBus>,
    music_folder: PathBuf,
    credentials: Option<CredentialProfile>,
}

impl DownloadPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        cache: Arc<CacheStore>,
        resolver: MetadataResolver,
        executor: DownloadExecutor,
        classifier: GenreClassifier,
        analyzer: Arc<AudioAnalyzer>,
        tracker: Arc<TaskTracker>,
        event_bus: Arc<EventBus>,
        music_folder: PathBuf,
        credentials: Option<CredentialProfile>,
    ) -> Self {
        Self {
            pool,
            cache,
            resolver,
            executor,
            classifier,
            analyzer,
            tracker,
            event_bus,
            music_folder,
            credentials,
        }
    }

    /// Execute one job to a terminal state. Never panics; every
    /// failure path lands the task in Error (or Cancelled).
    pub async fn run(&self, job: DownloadJob) {
        let task_id = job.task_id;
        let Some(current) = self.tracker.snapshot(task_id) else {
            tracing::warn!("job {} has no tracked task, dropping", task_id);
            return;
        };
        if current.state.is_terminal() {
            return;
        }
        let token = self
            .tracker
            .token_for(task_id)
            .unwrap_or_else(CancellationToken::new);

        if let Err(outcome) = self.execute(&job, &token).await {
            match outcome {
                PhaseFailure::Cancelled => {
                    tracing::info!("task {} cancelled", task_id);
                    self.tracker.transition(task_id, TaskState::Cancelled);
                }
                PhaseFailure::Failed(message) => {
                    tracing::error!("task {} failed: {}", task_id, message);
                    let _ = db::history::record(
                        &self.pool,
                        &job.reference.video_id,
                        HistoryAction::Failed,
                        Some(&message),
                    )
                    .await;
                    self.tracker.update(task_id, |task| {
                        task.error_message = Some(message.clone());
                    });
                    self.tracker.transition(task_id, TaskState::Error);
                }
            }
        }
    }

    async fn execute(&self, job: &DownloadJob, token: &CancellationToken) -> Result<(), PhaseFailure> {
        let task_id = job.task_id;
        let video_id = &job.reference.video_id;

        check_cancel(token)?;
        self.tracker.transition(task_id, TaskState::FetchingInfo);
        self.tracker.raise_progress(task_id, 2);

        // Primary dedup: already catalogued under this video id
        if let Some(existing) = db::catalog::find_by_video_id(&self.pool, video_id)
            .await
            .map_err(PhaseFailure::internal)?
        {
            tracing::info!("{} already catalogued at {}", video_id, existing.file_path);
            return self.complete_as_duplicate(job, existing.file_path).await;
        }

        let metadata = self
            .resolver
            .resolve(&job.reference)
            .await
            .map_err(|e| match e {
                MediaError::Cancelled => PhaseFailure::Cancelled,
                other => PhaseFailure::Failed(format!("metadata resolution failed: {other}")),
            })?;
        self.tracker.update(task_id, |task| {
            task.title = Some(metadata.title.clone());
        });
        self.tracker.raise_progress(task_id, 10);
        check_cancel(token)?;

        let fields = match self.cache.extracted(video_id).await {
            Some(fields) => fields,
            None => {
                let fields = ExtractedFields::derive(&metadata, GenreVocabulary::builtin());
                self.cache.store_extracted(video_id, &fields).await;
                fields
            }
        };
        self.tracker.raise_progress(task_id, 15);

        // Secondary dedup: same song under a different video id
        if let Some(artist) = &fields.artist {
            if let Some(existing) =
                db::catalog::find_by_artist_title(&self.pool, artist, &fields.title)
                    .await
                    .map_err(PhaseFailure::internal)?
            {
                tracing::info!(
                    "{} duplicates catalogued track {} ({} - {})",
                    video_id,
                    existing.video_id,
                    artist,
                    fields.title
                );
                return self.complete_as_duplicate(job, existing.file_path).await;
            }
        }

        let mut genre = match &fields.genre {
            Some(quick) => {
                let result = GenreResult {
                    genre: quick.clone(),
                    source: GenreSource::TitleKeyword,
                };
                // Same write-through as the cascade path
                self.cache.store_genre(video_id, &result).await;
                Some(result)
            }
            None => {
                let ctx = ClassifyContext {
                    video_id,
                    fields: &fields,
                    metadata: &metadata,
                };
                self.classifier.classify(&ctx).await
            }
        };
        self.tracker.raise_progress(task_id, 20);
        check_cancel(token)?;

        // Library layout: <root>/<genre>/<decade>/<artist - title>.mp3
        let genre_folder = genre
            .as_ref()
            .map(|g| g.genre.clone())
            .unwrap_or_else(|| UNCLASSIFIED.to_string());
        let decade = decade_from_year(fields.year);
        let target_dir = self
            .music_folder
            .join(sanitize_filename(&genre_folder))
            .join(&decade);
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| PhaseFailure::Failed(format!("cannot create {}: {e}", target_dir.display())))?;

        let stem = match &fields.artist {
            Some(artist) => sanitize_filename(&format!("{} - {}", artist, fields.title)),
            None => sanitize_filename(&fields.title),
        };
        let output_base = target_dir.join(&stem);

        self.tracker.transition(task_id, TaskState::Downloading);
        let (progress_tx, progress_rx) = mpsc::channel::<TransferProgress>(32);
        let forwarder = self.spawn_progress_forwarder(task_id, progress_rx);

        let plan = DownloadPlan::standard(self.credentials.clone());
        let download_result = self
            .executor
            .download(&job.reference, &plan, &output_base, progress_tx, token)
            .await;
        forwarder.abort();

        let file_path = download_result.map_err(|e| match e {
            MediaError::Cancelled => PhaseFailure::Cancelled,
            other => PhaseFailure::Failed(format!("download failed: {other}")),
        })?;

        self.tracker.transition(task_id, TaskState::PostProcessing);
        self.tracker.raise_progress(task_id, 90);
        check_cancel(token)?;

        // Audio analysis only when every text source passed
        if genre.is_none() {
            match self.analyzer.best_genre(&file_path).await {
                Ok(Some(label)) => {
                    let result = GenreResult {
                        genre: label,
                        source: GenreSource::AudioMl,
                    };
                    self.cache.store_genre(video_id, &result).await;
                    genre = Some(result);
                }
                Ok(None) => {}
                Err(e) => tracing::debug!("audio analysis skipped for {}: {}", video_id, e),
            }
        }
        self.tracker.raise_progress(task_id, 93);

        let genre_name = genre.as_ref().map(|g| g.genre.as_str());
        if let Err(e) = tagger::write_tags(&file_path, &fields, genre_name) {
            tracing::warn!("tagging failed for {}: {}", file_path.display(), e);
        }
        self.tracker.raise_progress(task_id, 96);

        let file_size = tokio::fs::metadata(&file_path)
            .await
            .ok()
            .map(|m| m.len() as i64);
        let entry = CatalogEntry {
            video_id: video_id.clone(),
            url: job.reference.url_str().to_string(),
            title: fields.title.clone(),
            artist: fields.artist.clone(),
            year: fields.year,
            genre: genre.as_ref().map(|g| g.genre.clone()),
            decade: Some(decade),
            file_path: file_path.display().to_string(),
            file_size,
            file_type: file_path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("mp3")
                .to_ascii_uppercase(),
            duration_seconds: metadata.duration_seconds,
            bitrate_kbps: None,
            source: job.source,
            downloaded_at: None,
        };

        match db::catalog::register(&self.pool, &entry)
            .await
            .map_err(PhaseFailure::internal)?
        {
            RegisterOutcome::Registered => {
                db::history::record(&self.pool, video_id, HistoryAction::Downloaded, None)
                    .await
                    .map_err(PhaseFailure::internal)?;
                self.event_bus.emit_lossy(DeckEvent::TrackCatalogued {
                    video_id: video_id.clone(),
                    file_path: entry.file_path.clone(),
                    timestamp: chrono::Utc::now(),
                });
            }
            RegisterOutcome::Conflict(key) => {
                // A racing task got there first; the file is in place
                let which = match key {
                    ConflictKey::VideoId => "video id",
                    ConflictKey::FilePath => "file path",
                };
                tracing::warn!("{} already registered by {}", video_id, which);
                db::history::record(
                    &self.pool,
                    video_id,
                    HistoryAction::Skipped,
                    Some("already catalogued"),
                )
                .await
                .map_err(PhaseFailure::internal)?;
            }
        }

        self.tracker.update(task_id, |task| {
            task.file_path = Some(entry.file_path.clone());
        });
        self.tracker.raise_progress(task_id, 100);
        self.tracker.transition(task_id, TaskState::Completed);
        Ok(())
    }

    /// A reference that is already catalogued completes immediately,
    /// pointing at the existing file.
    async fn complete_as_duplicate(
        &self,
        job: &DownloadJob,
        existing_path: String,
    ) -> Result<(), PhaseFailure> {
        db::history::record(
            &self.pool,
            &job.reference.video_id,
            HistoryAction::Skipped,
            Some("duplicate of catalogued track"),
        )
        .await
        .map_err(PhaseFailure::internal)?;
        self.tracker.update(job.task_id, |task| {
            task.file_path = Some(existing_path);
        });
        self.tracker.raise_progress(job.task_id, 100);
        self.tracker.transition(job.task_id, TaskState::Completed);
        Ok(())
    }

    /// Map raw transfer samples into the 20-90 overall window.
    fn spawn_progress_forwarder(
        &self,
        task_id: uuid::Uuid,
        mut rx: mpsc::Receiver<TransferProgress>,
    ) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(&self.tracker);
        tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                let percent = transfer_to_overall(sample.downloaded_bytes, sample.total_bytes);
                tracker.set_transfer(task_id, percent, sample.downloaded_bytes, sample.total_bytes);
            }
        })
    }
}

/// Transfer fraction mapped to the 20-90 window. Without a known
/// total the transfer stays at the window floor and only byte counts
/// move.
fn transfer_to_overall(downloaded: u64, total: Option<u64>) -> u8 {
    match total {
        Some(total) if total > 0 => {
            let fraction = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            20 + (fraction * 70.0) as u8
        }
        _ => 20,
    }
}

enum PhaseFailure {
    Cancelled,
    Failed(String),
}

impl PhaseFailure {
    fn internal(e: anyhow::Error) -> Self {
        PhaseFailure::Failed(e.to_string())
    }
}

fn check_cancel(token: &CancellationToken) -> Result<(), PhaseFailure> {
    if token.is_cancelled() {
        Err(PhaseFailure::Cancelled)
    } else {
        Ok(())
    }
}
