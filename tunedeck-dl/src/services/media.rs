//! Media engine abstraction and the yt-dlp implementation
//!
//! The pipeline never talks to yt-dlp directly; it goes through the
//! [`MediaService`] trait so tests can substitute a scripted engine
//! and so engine failures arrive pre-classified.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::models::ResolvedMetadata;

/// Classified media engine failure.
///
/// The variant decides fallback behavior: format and network failures
/// advance to the next format selector, authentication and availability
/// failures abandon the current credential tier.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    /// The requested format selector cannot be satisfied
    #[error("format unavailable: {0}")]
    FormatUnavailable(String),

    /// Credentials rejected or required
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The item itself is gone (private, deleted, region-blocked)
    #[error("item unavailable: {0}")]
    ItemUnavailable(String),

    /// Transport-level failure, possibly transient
    #[error("network failure: {0}")]
    Network(String),

    /// Engine binary not found on PATH
    #[error("media engine not found")]
    EngineMissing,

    /// Engine process could not be started or crashed
    #[error("engine failure: {0}")]
    Spawn(String),

    /// Engine output could not be understood
    #[error("unreadable engine output: {0}")]
    Parse(String),

    /// Operation cancelled by the caller
    #[error("cancelled")]
    Cancelled,
}

impl MediaError {
    /// Whether the next format selector in the same credential tier is
    /// worth trying.
    pub fn retry_same_tier(&self) -> bool {
        matches!(
            self,
            MediaError::FormatUnavailable(_) | MediaError::Network(_) | MediaError::Parse(_)
        )
    }
}

/// Map yt-dlp stderr text onto a [`MediaError`].
pub fn classify_engine_error(stderr: &str) -> MediaError {
    let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" ");
    let text = format!("{} {}", tail, stderr);
    if text.contains("Requested format is not available")
        || text.contains("Only images are available")
    {
        return MediaError::FormatUnavailable(last_line(stderr));
    }
    if text.contains("Video unavailable")
        || text.contains("Private video")
        || text.contains("This video has been removed")
    {
        return MediaError::ItemUnavailable(last_line(stderr));
    }
    if text.contains("Sign in to confirm")
        || text.contains("cookies")
        || text.contains("members-only")
        || text.contains("age-restricted")
    {
        return MediaError::Auth(last_line(stderr));
    }
    MediaError::Network(last_line(stderr))
}

fn last_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("unknown engine error")
        .trim()
        .to_string()
}

/// An authentication tier handed to the engine as a cookies file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialProfile {
    pub name: String,
    pub cookies_file: PathBuf,
}

/// How much metadata to pull for a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Full info JSON (description, tags, release fields)
    Full,
    /// Flat extraction only (id, title); much faster, used as fallback
    Flat,
}

/// One entry of a flat playlist listing
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub video_id: String,
    pub title: Option<String>,
}

/// Transfer progress sample forwarded during a download
#[derive(Debug, Clone, Copy)]
pub struct TransferProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// Media provider operations used by the pipeline
#[async_trait]
pub trait MediaService: Send + Sync {
    /// Resolve provider metadata for a single reference.
    async fn fetch_metadata(
        &self,
        url: &Url,
        mode: ExtractionMode,
        credentials: Option<&CredentialProfile>,
    ) -> Result<ResolvedMetadata, MediaError>;

    /// List entries of a playlist without downloading anything.
    async fn fetch_playlist(
        &self,
        url: &Url,
        limit: usize,
        credentials: Option<&CredentialProfile>,
    ) -> Result<Vec<PlaylistEntry>, MediaError>;

    /// Download and extract audio to `output_base` + `.mp3`.
    ///
    /// Progress samples go to `progress` (lossy); cancellation kills
    /// the engine process.
    async fn download(
        &self,
        url: &Url,
        format_selector: &str,
        credentials: Option<&CredentialProfile>,
        output_base: &Path,
        progress: mpsc::Sender<TransferProgress>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError>;
}

/// yt-dlp subprocess wrapper
pub struct YtDlpService {
    binary: String,
}

/// Raw shape of yt-dlp's info JSON; only fields we consume.
#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    description: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    release_year: Option<i32>,
    release_date: Option<String>,
    release_timestamp: Option<i64>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylistEntry {
    id: Option<String>,
    title: Option<String>,
}

impl YtDlpService {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Verify the engine binary is reachable, returning its version.
    pub async fn probe(&self) -> Result<String, MediaError> {
        which::which(&self.binary).map_err(|_| MediaError::EngineMissing)?;
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| MediaError::Spawn(e.to_string()))?;
        if !output.status.success() {
            return Err(MediaError::Spawn(format!(
                "{} --version exited with {}",
                self.binary, output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn base_command(&self, credentials: Option<&CredentialProfile>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--no-playlist").arg("--no-warnings");
        if let Some(profile) = credentials {
            cmd.arg("--cookies").arg(&profile.cookies_file);
        }
        cmd
    }
}

#[async_trait]
impl MediaService for YtDlpService {
    async fn fetch_metadata(
        &self,
        url: &Url,
        mode: ExtractionMode,
        credentials: Option<&CredentialProfile>,
    ) -> Result<ResolvedMetadata, MediaError> {
        let mut cmd = self.base_command(credentials);
        cmd.arg("--dump-json").arg("--no-download");
        if matches!(mode, ExtractionMode::Flat) {
            cmd.arg("--extract-flat").arg("--ignore-errors");
        }
        cmd.arg(url.as_str());

        let output = cmd
            .output()
            .await
            .map_err(|e| MediaError::Spawn(e.to_string()))?;
        if !output.status.success() {
            return Err(classify_engine_error(&String::from_utf8_lossy(&output.stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| MediaError::Parse("no JSON in engine output".to_string()))?;
        let raw: RawInfo =
            serde_json::from_str(line).map_err(|e| MediaError::Parse(e.to_string()))?;

        Ok(ResolvedMetadata {
            title: raw.title.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            uploader: raw.uploader,
            channel: raw.channel,
            duration_seconds: raw.duration,
            release_year: raw.release_year,
            release_date: raw.release_date,
            release_timestamp: raw.release_timestamp,
            upload_date: raw.upload_date,
            thumbnail_url: raw.thumbnail,
            tags: raw.tags,
        })
    }

    async fn fetch_playlist(
        &self,
        url: &Url,
        limit: usize,
        credentials: Option<&CredentialProfile>,
    ) -> Result<Vec<PlaylistEntry>, MediaError> {
        let mut cmd = Command::new(&self.binary);
        if let Some(profile) = credentials {
            cmd.arg("--cookies").arg(&profile.cookies_file);
        }
        cmd.arg("--flat-playlist")
            .arg("--dump-json")
            .arg("--ignore-errors")
            .arg("--no-warnings")
            .arg("--playlist-end")
            .arg(limit.to_string())
            .arg(url.as_str());

        let output = cmd
            .output()
            .await
            .map_err(|e| MediaError::Spawn(e.to_string()))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let entries: Vec<PlaylistEntry> = stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<RawPlaylistEntry>(line).ok())
            .filter_map(|raw| {
                raw.id.map(|id| PlaylistEntry {
                    video_id: id,
                    title: raw.title,
                })
            })
            .collect();

        // yt-dlp with --ignore-errors can exit nonzero after partial
        // output; only fail when nothing usable came back
        if entries.is_empty() && !output.status.success() {
            return Err(classify_engine_error(&String::from_utf8_lossy(&output.stderr)));
        }
        Ok(entries)
    }

    async fn download(
        &self,
        url: &Url,
        format_selector: &str,
        credentials: Option<&CredentialProfile>,
        output_base: &Path,
        progress: mpsc::Sender<TransferProgress>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let template = format!("{}.%(ext)s", output_base.display());
        let mut cmd = self.base_command(credentials);
        cmd.arg("-f")
            .arg(format_selector)
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("0")
            .arg("--newline")
            .arg("--progress-template")
            .arg("download:%(progress.downloaded_bytes)s %(progress.total_bytes)s")
            .arg("-o")
            .arg(&template)
            .arg(url.as_str())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| MediaError::Spawn(e.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::Spawn("no stdout handle".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::Spawn("no stderr handle".to_string()))?;

        let mut lines = BufReader::new(stdout).lines();
        let status = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(MediaError::Cancelled);
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(sample) = parse_progress_line(&line) {
                                let _ = progress.try_send(sample);
                            }
                        }
                        Ok(None) => {
                            break child.wait().await.map_err(|e| MediaError::Spawn(e.to_string()))?;
                        }
                        Err(e) => {
                            let _ = child.start_kill();
                            return Err(MediaError::Spawn(e.to_string()));
                        }
                    }
                }
            }
        };

        let mut stderr_text = String::new();
        let _ = stderr.read_to_string(&mut stderr_text).await;
        if !status.success() {
            return Err(classify_engine_error(&stderr_text));
        }

        let final_path = output_base.with_extension("mp3");
        if !final_path.exists() {
            return Err(MediaError::Parse(format!(
                "engine reported success but {} is missing",
                final_path.display()
            )));
        }
        Ok(final_path)
    }
}

/// Parse a `download:<bytes> <total>` progress template line.
/// Either field may be `NA` while the engine estimates.
fn parse_progress_line(line: &str) -> Option<TransferProgress> {
    let rest = line.strip_prefix("download:")?;
    let mut parts = rest.split_whitespace();
    let downloaded = parts.next()?.parse::<u64>().ok()?;
    let total = parts.next().and_then(|t| t.parse::<u64>().ok());
    Some(TransferProgress {
        downloaded_bytes: downloaded,
        total_bytes: total,
    })
}
