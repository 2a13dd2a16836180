//! Two-tier reference metadata cache
//!
//! Memory tier answers repeat lookups within a session; the SQLite
//! tier survives restarts. Writes go to both tiers, with persistence
//! failures logged and swallowed so a read-only database never blocks
//! a download.

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::db;
use crate::models::{ExtractedFields, GenreResult, ResolvedMetadata};

pub struct CacheStore {
    pool: SqlitePool,
    resolved: RwLock<HashMap<String, ResolvedMetadata>>,
    extracted: RwLock<HashMap<String, ExtractedFields>>,
    genre: RwLock<HashMap<String, GenreResult>>,
}

impl CacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            resolved: RwLock::new(HashMap::new()),
            extracted: RwLock::new(HashMap::new()),
            genre: RwLock::new(HashMap::new()),
        }
    }

    pub async fn resolved(&self, video_id: &str) -> Option<ResolvedMetadata> {
        if let Ok(map) = self.resolved.read() {
            if let Some(hit) = map.get(video_id) {
                return Some(hit.clone());
            }
        }
        match db::cache::get_resolved(&self.pool, video_id).await {
            Ok(Some(metadata)) => {
                self.remember_resolved(video_id, &metadata);
                Some(metadata)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("cache read failed for {}: {}", video_id, e);
                None
            }
        }
    }

    pub async fn store_resolved(&self, video_id: &str, metadata: &ResolvedMetadata) {
        self.remember_resolved(video_id, metadata);
        if let Err(e) = db::cache::put_resolved(&self.pool, video_id, metadata).await {
            tracing::warn!("cache persist failed for {}: {}", video_id, e);
        }
    }

    pub async fn extracted(&self, video_id: &str) -> Option<ExtractedFields> {
        if let Ok(map) = self.extracted.read() {
            if let Some(hit) = map.get(video_id) {
                return Some(hit.clone());
            }
        }
        match db::cache::get_extracted(&self.pool, video_id).await {
            Ok(Some(fields)) => {
                if let Ok(mut map) = self.extracted.write() {
                    map.insert(video_id.to_string(), fields.clone());
                }
                Some(fields)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("cache read failed for {}: {}", video_id, e);
                None
            }
        }
    }

    pub async fn store_extracted(&self, video_id: &str, fields: &ExtractedFields) {
        if let Ok(mut map) = self.extracted.write() {
            map.insert(video_id.to_string(), fields.clone());
        }
        if let Err(e) = db::cache::put_extracted(&self.pool, video_id, fields).await {
            tracing::warn!("cache persist failed for {}: {}", video_id, e);
        }
    }

    pub async fn genre(&self, video_id: &str) -> Option<GenreResult> {
        if let Ok(map) = self.genre.read() {
            if let Some(hit) = map.get(video_id) {
                return Some(hit.clone());
            }
        }
        match db::cache::get_genre(&self.pool, video_id).await {
            Ok(Some(result)) => {
                if let Ok(mut map) = self.genre.write() {
                    map.insert(video_id.to_string(), result.clone());
                }
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("cache read failed for {}: {}", video_id, e);
                None
            }
        }
    }

    pub async fn store_genre(&self, video_id: &str, result: &GenreResult) {
        if let Ok(mut map) = self.genre.write() {
            map.insert(video_id.to_string(), result.clone());
        }
        if let Err(e) = db::cache::put_genre(&self.pool, video_id, result).await {
            tracing::warn!("cache persist failed for {}: {}", video_id, e);
        }
    }

    /// Invalidate everything cached for one reference, both tiers.
    pub async fn clear(&self, video_id: &str) {
        if let Ok(mut map) = self.resolved.write() {
            map.remove(video_id);
        }
        if let Ok(mut map) = self.extracted.write() {
            map.remove(video_id);
        }
        if let Ok(mut map) = self.genre.write() {
            map.remove(video_id);
        }
        if let Err(e) = db::cache::clear(&self.pool, video_id).await {
            tracing::warn!("cache clear failed for {}: {}", video_id, e);
        }
    }

    /// Flush both tiers entirely.
    pub async fn clear_all(&self) {
        if let Ok(mut map) = self.resolved.write() {
            map.clear();
        }
        if let Ok(mut map) = self.extracted.write() {
            map.clear();
        }
        if let Ok(mut map) = self.genre.write() {
            map.clear();
        }
        if let Err(e) = db::cache::clear_all(&self.pool).await {
            tracing::warn!("cache clear failed: {}", e);
        }
    }

    fn remember_resolved(&self, video_id: &str, metadata: &ResolvedMetadata) {
        if let Ok(mut map) = self.resolved.write() {
            map.insert(video_id.to_string(), metadata.clone());
        }
    }
}
