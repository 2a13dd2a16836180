//! Shared test helpers: a scripted media engine and a full service
//! harness wired against a temporary database and music folder.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use url::Url;

use sqlx::SqlitePool;
use tunedeck_common::config::Settings;
use tunedeck_common::events::EventBus;

use tunedeck_dl::models::ResolvedMetadata;
use tunedeck_dl::services::cache::CacheStore;
use tunedeck_dl::services::executor::DownloadExecutor;
use tunedeck_dl::services::genre::{
    AudioAnalyzer, ChannelStrategy, DescriptionDeepStrategy, GenreClassifier, GenreStrategy,
    GenreVocabulary, HashtagStrategy, HistoryStrategy, TagsStrategy, TitleKeywordStrategy,
};
use tunedeck_dl::services::media::{
    CredentialProfile, ExtractionMode, MediaError, MediaService, PlaylistEntry, TransferProgress,
};
use tunedeck_dl::services::playlist::PlaylistBrowser;
use tunedeck_dl::services::resolver::MetadataResolver;
use tunedeck_dl::workflow::{DownloadPipeline, TaskTracker, WorkerPool};
use tunedeck_dl::AppState;

/// A media engine that replays scripted results instead of spawning
/// processes. Empty scripts fall back to a default success.
pub struct ScriptedMedia {
    metadata_script: Mutex<VecDeque<Result<ResolvedMetadata, MediaError>>>,
    download_script: Mutex<VecDeque<Result<(), MediaError>>>,
    playlist: Mutex<Vec<PlaylistEntry>>,
    fallback_metadata: Mutex<Option<ResolvedMetadata>>,
    metadata_gate: Mutex<Option<Arc<Semaphore>>>,
    /// Each metadata attempt as (mode, credentialed), in call order
    pub metadata_requests: Mutex<Vec<(ExtractionMode, bool)>>,
    pub metadata_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl ScriptedMedia {
    pub fn new() -> Self {
        Self {
            metadata_script: Mutex::new(VecDeque::new()),
            download_script: Mutex::new(VecDeque::new()),
            playlist: Mutex::new(Vec::new()),
            fallback_metadata: Mutex::new(None),
            metadata_gate: Mutex::new(None),
            metadata_requests: Mutex::new(Vec::new()),
            metadata_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_metadata(title: &str) -> Self {
        let media = Self::new();
        media.set_fallback_metadata(sample_metadata(title));
        media
    }

    pub fn set_fallback_metadata(&self, metadata: ResolvedMetadata) {
        *self.fallback_metadata.lock().unwrap() = Some(metadata);
    }

    pub fn push_metadata(&self, result: Result<ResolvedMetadata, MediaError>) {
        self.metadata_script.lock().unwrap().push_back(result);
    }

    pub fn push_download(&self, result: Result<(), MediaError>) {
        self.download_script.lock().unwrap().push_back(result);
    }

    pub fn set_playlist(&self, entries: Vec<PlaylistEntry>) {
        *self.playlist.lock().unwrap() = entries;
    }

    pub fn downloads(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    /// Make every metadata fetch park until a permit is released.
    /// Releasing a single permit opens the gate for good, since each
    /// fetch returns its permit on the way through.
    pub fn gate_metadata(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.metadata_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl MediaService for ScriptedMedia {
    async fn fetch_metadata(
        &self,
        _url: &Url,
        mode: ExtractionMode,
        credentials: Option<&CredentialProfile>,
    ) -> Result<ResolvedMetadata, MediaError> {
        self.metadata_requests
            .lock()
            .unwrap()
            .push((mode, credentials.is_some()));
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.metadata_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        let scripted = self.metadata_script.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => match self.fallback_metadata.lock().unwrap().clone() {
                Some(metadata) => Ok(metadata),
                None => Err(MediaError::Network("no scripted metadata".to_string())),
            },
        }
    }

    async fn fetch_playlist(
        &self,
        _url: &Url,
        limit: usize,
        _credentials: Option<&CredentialProfile>,
    ) -> Result<Vec<PlaylistEntry>, MediaError> {
        let entries = self.playlist.lock().unwrap().clone();
        Ok(entries.into_iter().take(limit).collect())
    }

    async fn download(
        &self,
        _url: &Url,
        _format_selector: &str,
        _credentials: Option<&CredentialProfile>,
        output_base: &Path,
        progress: mpsc::Sender<TransferProgress>,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.download_script.lock().unwrap().pop_front();
        match scripted {
            Some(Err(e)) => Err(e),
            Some(Ok(())) | None => {
                let path = output_base.with_extension("mp3");
                if let Some(parent) = path.parent() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
                tokio::fs::write(&path, b"ID3\x03\x00\x00\x00fake audio")
                    .await
                    .map_err(|e| MediaError::Spawn(e.to_string()))?;
                let _ = progress
                    .send(TransferProgress {
                        downloaded_bytes: 100,
                        total_bytes: Some(100),
                    })
                    .await;
                Ok(path)
            }
        }
    }
}

pub fn sample_metadata(title: &str) -> ResolvedMetadata {
    ResolvedMetadata {
        title: title.to_string(),
        uploader: Some("Test Channel".to_string()),
        duration_seconds: Some(215.0),
        ..Default::default()
    }
}

/// Everything a test needs: the running service graph minus the HTTP
/// listener, backed by a temp directory.
pub struct Harness {
    pub media: Arc<ScriptedMedia>,
    pub pool: SqlitePool,
    pub tracker: Arc<TaskTracker>,
    pub pipeline: Arc<DownloadPipeline>,
    pub state: AppState,
    pub music_folder: PathBuf,
    pub tempdir: tempfile::TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_media(Arc::new(ScriptedMedia::with_metadata(
            "Test Artist - Deep House Anthem (2019)",
        )))
        .await
    }

    pub async fn with_media(media: Arc<ScriptedMedia>) -> Self {
        let tempdir = tempfile::tempdir().unwrap();
        let music_folder = tempdir.path().join("music");
        tokio::fs::create_dir_all(&music_folder).await.unwrap();
        let database_path = tempdir.path().join("tunedeck.db");

        let pool = tunedeck_dl::db::init_database_pool(&database_path)
            .await
            .unwrap();
        tunedeck_dl::db::init_tables(&pool).await.unwrap();

        let settings = Arc::new(Settings {
            music_folder: music_folder.clone(),
            database_path,
            cookies_file: None,
            lastfm_api_key: None,
            media_engine: "yt-dlp".to_string(),
            analyzer_binary: None,
            listen_port: 0,
            worker_count: 2,
            queue_depth: 8,
            task_retention_secs: 900,
            playlist_limit: 50,
            log_filter: "info".to_string(),
        });

        let event_bus = Arc::new(EventBus::new(100));
        let tracker = Arc::new(TaskTracker::new(
            Duration::from_secs(900),
            Arc::clone(&event_bus),
        ));

        let dyn_media: Arc<dyn MediaService> = media.clone();
        let cache = Arc::new(CacheStore::new(pool.clone()));
        let resolver = MetadataResolver::new(Arc::clone(&dyn_media), Arc::clone(&cache), None);
        let executor = DownloadExecutor::new(Arc::clone(&dyn_media));
        let classifier = GenreClassifier::with_strategies(
            offline_strategies(pool.clone()),
            Arc::clone(&cache),
        );
        let analyzer = Arc::new(AudioAnalyzer::new(None));

        let pipeline = Arc::new(DownloadPipeline::new(
            pool.clone(),
            Arc::clone(&cache),
            resolver,
            executor,
            classifier,
            analyzer,
            Arc::clone(&tracker),
            Arc::clone(&event_bus),
            music_folder.clone(),
            None,
        ));
        let workers = WorkerPool::start(2, 8, Arc::clone(&pipeline));
        let browser = Arc::new(PlaylistBrowser::new(
            dyn_media,
            cache,
            pool.clone(),
            Arc::clone(&tracker),
            None,
        ));

        let state = AppState::new(
            pool.clone(),
            settings,
            event_bus,
            Arc::clone(&tracker),
            workers,
            browser,
        );

        Self {
            media,
            pool,
            tracker,
            pipeline,
            state,
            music_folder,
            tempdir,
        }
    }

    pub fn router(&self) -> axum::Router {
        tunedeck_dl::build_router(self.state.clone())
    }
}

/// The text-only classification strategies; nothing here touches the
/// network, so tests stay deterministic.
fn offline_strategies(pool: SqlitePool) -> Vec<Box<dyn GenreStrategy>> {
    let vocab = GenreVocabulary::builtin();
    vec![
        Box::new(HistoryStrategy::new(pool)),
        Box::new(HashtagStrategy::new(vocab)),
        Box::new(TagsStrategy::new(vocab)),
        Box::new(ChannelStrategy::new(vocab)),
        Box::new(TitleKeywordStrategy::new(vocab)),
        Box::new(DescriptionDeepStrategy::new(vocab)),
    ]
}
