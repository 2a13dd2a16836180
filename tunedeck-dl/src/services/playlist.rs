//! Playlist discovery
//!
//! Lists playlist entries annotated with local state: whether each
//! reference is already catalogued, rejected, or actively downloading.
//! Enrichment (artist, genre, thumbnail) comes only from the cache;
//! browsing never triggers per-item provider calls.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use url::Url;

use crate::db;
use crate::services::cache::CacheStore;
use crate::services::media::{CredentialProfile, MediaService};
use crate::workflow::tracker::TaskTracker;

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistItem {
    pub video_id: String,
    pub url: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_downloaded: bool,
    pub is_rejected: bool,
    pub is_downloading: bool,
}

pub struct PlaylistBrowser {
    media: Arc<dyn MediaService>,
    cache: Arc<CacheStore>,
    pool: SqlitePool,
    tracker: Arc<TaskTracker>,
    credentials: Option<CredentialProfile>,
}

impl PlaylistBrowser {
    pub fn new(
        media: Arc<dyn MediaService>,
        cache: Arc<CacheStore>,
        pool: SqlitePool,
        tracker: Arc<TaskTracker>,
        credentials: Option<CredentialProfile>,
    ) -> Self {
        Self {
            media,
            cache,
            pool,
            tracker,
            credentials,
        }
    }

    /// List up to `limit` playlist entries. With `show_hidden` false,
    /// already-catalogued and rejected items are filtered out.
    pub async fn list(&self, playlist_url: &Url, limit: usize, show_hidden: bool) -> Result<Vec<PlaylistItem>> {
        let entries = self
            .media
            .fetch_playlist(playlist_url, limit, self.credentials.as_ref())
            .await
            .map_err(|e| anyhow::anyhow!("playlist fetch failed: {e}"))?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let video_id = entry.video_id;
            let is_downloaded = db::catalog::find_by_video_id(&self.pool, &video_id)
                .await?
                .is_some();
            let is_rejected = db::rejected::is_rejected(&self.pool, &video_id).await?;
            if !show_hidden && (is_downloaded || is_rejected) {
                continue;
            }

            let cached_metadata = self.cache.resolved(&video_id).await;
            let cached_fields = self.cache.extracted(&video_id).await;
            let cached_genre = self.cache.genre(&video_id).await;

            items.push(PlaylistItem {
                url: format!("https://www.youtube.com/watch?v={video_id}"),
                title: cached_metadata
                    .as_ref()
                    .map(|m| m.title.clone())
                    .or(entry.title),
                artist: cached_fields.and_then(|f| f.artist),
                genre: cached_genre.map(|g| g.genre),
                thumbnail_url: cached_metadata.and_then(|m| m.thumbnail_url),
                is_downloading: self.tracker.is_active_for(&video_id),
                is_downloaded,
                is_rejected,
                video_id,
            });
        }
        Ok(items)
    }
}
