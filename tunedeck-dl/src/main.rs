//! tunedeck-dl - Media Download Service
//!
//! Resolves media references, classifies genres, downloads audio
//! through an external engine, and maintains a deduplicated catalog
//! on disk. Controlled over an HTTP API.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tunedeck_common::config::Settings;
use tunedeck_common::events::EventBus;

use tunedeck_dl::services::cache::CacheStore;
use tunedeck_dl::services::executor::DownloadExecutor;
use tunedeck_dl::services::genre::{AudioAnalyzer, GenreClassifier};
use tunedeck_dl::services::media::{CredentialProfile, MediaService, YtDlpService};
use tunedeck_dl::services::playlist::PlaylistBrowser;
use tunedeck_dl::services::resolver::MetadataResolver;
use tunedeck_dl::workflow::{DownloadPipeline, TaskTracker, WorkerPool};
use tunedeck_dl::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Arc::new(Settings::load("tunedeck-dl")?);

    let filter = EnvFilter::try_from_env("TUNEDECK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting tunedeck-dl (Media Download Service)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Music folder: {}", settings.music_folder.display());

    tokio::fs::create_dir_all(&settings.music_folder).await?;

    info!("Database: {}", settings.database_path.display());
    let db_pool = tunedeck_dl::db::init_database_pool(&settings.database_path).await?;
    tunedeck_dl::db::init_tables(&db_pool).await?;

    // The settings table overrides the config file for the API key,
    // so a key entered at runtime survives restarts.
    let lastfm_api_key =
        match tunedeck_dl::db::settings::get(&db_pool, tunedeck_dl::db::settings::LASTFM_API_KEY)
            .await?
        {
            Some(key) if !key.is_empty() => Some(key),
            _ => settings.lastfm_api_key.clone(),
        };

    let engine = YtDlpService::new(settings.media_engine.clone());
    match engine.probe().await {
        Ok(version) => info!("Media engine: {} {}", settings.media_engine, version),
        Err(e) => tracing::warn!(
            "media engine {} unavailable, downloads will fail: {}",
            settings.media_engine,
            e
        ),
    }
    let media: Arc<dyn MediaService> = Arc::new(engine);

    let credentials = settings.cookies_file.clone().map(|cookies_file| {
        info!("Using cookies from {}", cookies_file.display());
        CredentialProfile {
            name: "default".to_string(),
            cookies_file,
        }
    });

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    let cache = Arc::new(CacheStore::new(db_pool.clone()));
    let resolver = MetadataResolver::new(Arc::clone(&media), Arc::clone(&cache), credentials.clone());
    let executor = DownloadExecutor::new(Arc::clone(&media));
    let classifier = GenreClassifier::new(
        db_pool.clone(),
        Arc::clone(&cache),
        http,
        lastfm_api_key,
    );
    let analyzer = Arc::new(AudioAnalyzer::new(settings.analyzer_binary.clone()));

    let event_bus = Arc::new(EventBus::new(1000));
    let tracker = Arc::new(TaskTracker::new(
        Duration::from_secs(settings.task_retention_secs),
        Arc::clone(&event_bus),
    ));
    tracker.spawn_sweeper();

    let pipeline = Arc::new(DownloadPipeline::new(
        db_pool.clone(),
        Arc::clone(&cache),
        resolver,
        executor,
        classifier,
        analyzer,
        Arc::clone(&tracker),
        Arc::clone(&event_bus),
        settings.music_folder.clone(),
        credentials.clone(),
    ));
    let workers = WorkerPool::start(settings.worker_count, settings.queue_depth, pipeline);
    info!(
        "Worker pool: {} workers, queue depth {}",
        settings.worker_count, settings.queue_depth
    );

    let browser = Arc::new(PlaylistBrowser::new(
        media,
        cache,
        db_pool.clone(),
        Arc::clone(&tracker),
        credentials,
    ));

    let state = AppState::new(db_pool, settings.clone(), event_bus, tracker, workers, browser);
    let app = tunedeck_dl::build_router(state);

    let listener =
        tokio::net::TcpListener::bind(("127.0.0.1", settings.listen_port)).await?;
    info!("Listening on http://127.0.0.1:{}", settings.listen_port);
    info!(
        "Health check: http://127.0.0.1:{}/health",
        settings.listen_port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
