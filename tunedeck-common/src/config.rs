//! Configuration loading for TuneDeck services
//!
//! Values resolve in priority order:
//! 1. Environment variable (`TUNEDECK_*`)
//! 2. TOML config file (`~/.config/tunedeck/<service>.toml`)
//! 3. OS-dependent compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Raw TOML configuration file contents. Every field is optional;
/// missing values fall back to environment variables and then defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub music_folder: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub cookies_file: Option<PathBuf>,
    pub lastfm_api_key: Option<String>,
    pub media_engine: Option<String>,
    pub analyzer_binary: Option<PathBuf>,
    pub listen_port: Option<u16>,
    pub worker_count: Option<usize>,
    pub queue_depth: Option<usize>,
    pub task_retention_secs: Option<u64>,
    pub playlist_limit: Option<usize>,
    pub log_filter: Option<String>,
}

/// Fully resolved runtime settings for the downloader daemon.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the organized music library (genre/decade folders live below it)
    pub music_folder: PathBuf,
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Optional cookies file handed to the media engine for authenticated fetches
    pub cookies_file: Option<PathBuf>,
    /// Last.fm API key; may also arrive later from the settings table
    pub lastfm_api_key: Option<String>,
    /// Media engine binary name or path (yt-dlp compatible)
    pub media_engine: String,
    /// Optional audio genre analyzer binary
    pub analyzer_binary: Option<PathBuf>,
    pub listen_port: u16,
    pub worker_count: usize,
    pub queue_depth: usize,
    pub task_retention_secs: u64,
    pub playlist_limit: usize,
    pub log_filter: String,
}

impl Settings {
    /// Load settings for a named service (e.g. `tunedeck-dl`).
    ///
    /// A missing config file is not an error; env vars and defaults
    /// cover every field.
    pub fn load(service: &str) -> Result<Self> {
        let toml_config = match config_file_path(service) {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                toml::from_str::<TomlConfig>(&contents)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
            }
            _ => TomlConfig::default(),
        };
        Ok(Self::resolve(toml_config))
    }

    /// Resolve raw TOML values against the environment and defaults.
    pub fn resolve(toml_config: TomlConfig) -> Self {
        let music_folder = env_path("TUNEDECK_MUSIC_FOLDER")
            .or(toml_config.music_folder)
            .unwrap_or_else(default_music_folder);
        let database_path = env_path("TUNEDECK_DATABASE")
            .or(toml_config.database_path)
            .unwrap_or_else(default_database_path);
        let cookies_file = env_path("TUNEDECK_COOKIES_FILE").or(toml_config.cookies_file);
        let lastfm_api_key = env_string("TUNEDECK_LASTFM_API_KEY").or(toml_config.lastfm_api_key);
        let media_engine = env_string("TUNEDECK_MEDIA_ENGINE")
            .or(toml_config.media_engine)
            .unwrap_or_else(|| "yt-dlp".to_string());
        let analyzer_binary = env_path("TUNEDECK_ANALYZER").or(toml_config.analyzer_binary);
        let listen_port = env_parse("TUNEDECK_PORT")
            .or(toml_config.listen_port)
            .unwrap_or(5180);
        let worker_count = env_parse("TUNEDECK_WORKERS")
            .or(toml_config.worker_count)
            .unwrap_or(3)
            .max(1);
        let queue_depth = env_parse("TUNEDECK_QUEUE_DEPTH")
            .or(toml_config.queue_depth)
            .unwrap_or(64)
            .max(1);
        let task_retention_secs = env_parse("TUNEDECK_TASK_RETENTION_SECS")
            .or(toml_config.task_retention_secs)
            .unwrap_or(900);
        let playlist_limit = env_parse("TUNEDECK_PLAYLIST_LIMIT")
            .or(toml_config.playlist_limit)
            .unwrap_or(50);
        let log_filter = env_string("TUNEDECK_LOG")
            .or(toml_config.log_filter)
            .unwrap_or_else(|| "info".to_string());

        Self {
            music_folder,
            database_path,
            cookies_file,
            lastfm_api_key,
            media_engine,
            analyzer_binary,
            listen_port,
            worker_count,
            queue_depth,
            task_retention_secs,
            playlist_limit,
            log_filter,
        }
    }
}

/// Config file location: `$TUNEDECK_CONFIG` wins, otherwise the
/// platform config directory.
fn config_file_path(service: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TUNEDECK_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("tunedeck").join(format!("{service}.toml")))
}

fn default_music_folder() -> PathBuf {
    dirs::audio_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("tunedeck"))
        .unwrap_or_else(|| PathBuf::from("./tunedeck_music"))
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tunedeck").join("tunedeck.db"))
        .unwrap_or_else(|| PathBuf::from("./tunedeck.db"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}
