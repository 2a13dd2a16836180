//! Catalog history strategy: an artist's most common catalogued genre

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{ClassifyContext, GenreStrategy};
use crate::db::catalog;
use crate::models::GenreSource;

/// Placeholder genres that never count as a history hit.
const GENERIC: [&str; 3] = ["unclassified", "unknown", "other"];

pub struct HistoryStrategy {
    pool: SqlitePool,
}

impl HistoryStrategy {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenreStrategy for HistoryStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::History
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        let artist = ctx.fields.artist.as_deref()?;
        let counts = match catalog::genre_counts_for_artist(&self.pool, artist).await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!("history lookup failed for {}: {}", artist, e);
                return None;
            }
        };
        counts
            .into_iter()
            .find(|(genre, _)| !GENERIC.contains(&genre.to_lowercase().as_str()))
            .map(|(genre, _)| genre)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::catalog::{register, CatalogEntry};
    use crate::models::{DownloadSource, ExtractedFields, ResolvedMetadata};

    async fn seed(pool: &SqlitePool, video_id: &str, genre: Option<&str>) {
        let entry = CatalogEntry {
            video_id: video_id.to_string(),
            url: format!("https://www.youtube.com/watch?v={video_id}"),
            title: format!("Track {video_id}"),
            artist: Some("Dusty Kid".to_string()),
            year: None,
            genre: genre.map(str::to_string),
            decade: None,
            file_path: format!("/music/{video_id}.mp3"),
            file_size: None,
            file_type: "MP3".to_string(),
            duration_seconds: None,
            bitrate_kbps: None,
            source: DownloadSource::Direct,
            downloaded_at: None,
        };
        register(pool, &entry).await.unwrap();
    }

    #[tokio::test]
    async fn most_common_real_genre_wins() {
        let pool = test_pool().await;
        seed(&pool, "a", Some("Unclassified")).await;
        seed(&pool, "b", Some("Unclassified")).await;
        seed(&pool, "c", Some("Techno")).await;
        seed(&pool, "d", Some("Techno")).await;
        seed(&pool, "e", Some("House")).await;

        let strategy = HistoryStrategy::new(pool);
        let fields = ExtractedFields {
            artist: Some("Dusty Kid".to_string()),
            ..Default::default()
        };
        let metadata = ResolvedMetadata::default();
        let ctx = ClassifyContext {
            video_id: "new",
            fields: &fields,
            metadata: &metadata,
        };
        assert_eq!(strategy.classify(&ctx).await.as_deref(), Some("Techno"));
    }

    #[tokio::test]
    async fn no_artist_passes() {
        let pool = test_pool().await;
        let strategy = HistoryStrategy::new(pool);
        let fields = ExtractedFields::default();
        let metadata = ResolvedMetadata::default();
        let ctx = ClassifyContext {
            video_id: "new",
            fields: &fields,
            metadata: &metadata,
        };
        assert!(strategy.classify(&ctx).await.is_none());
    }
}
