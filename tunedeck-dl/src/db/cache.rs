//! Persistent tier of the reference metadata cache
//!
//! Each stage's result lives in its own JSON column so a later stage
//! can upsert without clobbering earlier results.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::models::{ExtractedFields, GenreResult, GenreSource, ResolvedMetadata};

pub async fn get_resolved(pool: &SqlitePool, video_id: &str) -> Result<Option<ResolvedMetadata>> {
    get_json_column(pool, video_id, "resolved").await
}

pub async fn put_resolved(
    pool: &SqlitePool,
    video_id: &str,
    metadata: &ResolvedMetadata,
) -> Result<()> {
    put_json_column(pool, video_id, "resolved", serde_json::to_string(metadata)?).await
}

pub async fn get_extracted(pool: &SqlitePool, video_id: &str) -> Result<Option<ExtractedFields>> {
    get_json_column(pool, video_id, "extracted").await
}

pub async fn put_extracted(
    pool: &SqlitePool,
    video_id: &str,
    fields: &ExtractedFields,
) -> Result<()> {
    put_json_column(pool, video_id, "extracted", serde_json::to_string(fields)?).await
}

pub async fn get_genre(pool: &SqlitePool, video_id: &str) -> Result<Option<GenreResult>> {
    let row = sqlx::query("SELECT genre, genre_source FROM reference_cache WHERE video_id = ?")
        .bind(video_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.and_then(|row| {
        let genre: Option<String> = row.get("genre");
        let source: Option<String> = row.get("genre_source");
        match (genre, source.and_then(|s| GenreSource::parse(&s))) {
            (Some(genre), Some(source)) => Some(GenreResult { genre, source }),
            _ => None,
        }
    }))
}

pub async fn put_genre(pool: &SqlitePool, video_id: &str, result: &GenreResult) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reference_cache (video_id, genre, genre_source, updated_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(video_id) DO UPDATE SET
            genre = excluded.genre,
            genre_source = excluded.genre_source,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(video_id)
    .bind(&result.genre)
    .bind(result.source.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop all cached stages for one reference.
pub async fn clear(pool: &SqlitePool, video_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM reference_cache WHERE video_id = ?")
        .bind(video_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop every cached reference.
pub async fn clear_all(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM reference_cache")
        .execute(pool)
        .await?;
    Ok(())
}

async fn get_json_column<T: serde::de::DeserializeOwned>(
    pool: &SqlitePool,
    video_id: &str,
    column: &str,
) -> Result<Option<T>> {
    let sql = format!("SELECT {column} FROM reference_cache WHERE video_id = ?");
    let row = sqlx::query(&sql).bind(video_id).fetch_optional(pool).await?;
    let json: Option<String> = match row {
        Some(row) => row.get(0),
        None => None,
    };
    // A row corrupted by hand-editing is treated as a miss
    Ok(json.and_then(|j| serde_json::from_str(&j).ok()))
}

async fn put_json_column(
    pool: &SqlitePool,
    video_id: &str,
    column: &str,
    json: String,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO reference_cache (video_id, {column}, updated_at) \
         VALUES (?, ?, CURRENT_TIMESTAMP) \
         ON CONFLICT(video_id) DO UPDATE SET {column} = excluded.{column}, updated_at = CURRENT_TIMESTAMP"
    );
    sqlx::query(&sql).bind(video_id).bind(json).execute(pool).await?;
    Ok(())
}
