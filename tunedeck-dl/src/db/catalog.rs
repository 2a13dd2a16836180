//! Track catalog operations
//!
//! The catalog is the deduplication authority: `video_id` and
//! `file_path` are both UNIQUE, and registration reports which key
//! collided so callers can distinguish "same video" from "same file".

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::models::DownloadSource;
use crate::models::metadata::decade_from_year;

/// A catalogued track
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub video_id: String,
    pub url: String,
    pub title: String,
    pub artist: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub decade: Option<String>,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub file_type: String,
    pub duration_seconds: Option<f64>,
    pub bitrate_kbps: Option<i64>,
    pub source: DownloadSource,
    pub downloaded_at: Option<DateTime<Utc>>,
}

/// Which UNIQUE key a failed registration collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKey {
    VideoId,
    FilePath,
}

/// Outcome of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    Conflict(ConflictKey),
}

/// Partial update for catalog metadata correction
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CatalogUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
}

/// Aggregate catalog statistics
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total_tracks: i64,
    pub total_bytes: i64,
    pub genres: Vec<(String, i64)>,
    pub decades: Vec<(String, i64)>,
}

/// Insert a new track. A collision on either UNIQUE key is reported as
/// a [`RegisterOutcome::Conflict`] naming the offending key; the stored
/// row is left untouched.
pub async fn register(pool: &SqlitePool, entry: &CatalogEntry) -> Result<RegisterOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO tracks (
            video_id, url, title, artist, year, genre, decade,
            file_path, file_size, file_type, duration_seconds, bitrate_kbps,
            source, downloaded_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(&entry.video_id)
    .bind(&entry.url)
    .bind(&entry.title)
    .bind(&entry.artist)
    .bind(entry.year)
    .bind(&entry.genre)
    .bind(&entry.decade)
    .bind(&entry.file_path)
    .bind(entry.file_size)
    .bind(&entry.file_type)
    .bind(entry.duration_seconds)
    .bind(entry.bitrate_kbps)
    .bind(entry.source.as_str())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(RegisterOutcome::Registered),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            let message = db_err.message().to_string();
            let key = if message.contains("tracks.file_path") {
                ConflictKey::FilePath
            } else {
                ConflictKey::VideoId
            };
            Ok(RegisterOutcome::Conflict(key))
        }
        Err(e) => Err(e.into()),
    }
}

/// Load a track by video id
pub async fn find_by_video_id(pool: &SqlitePool, video_id: &str) -> Result<Option<CatalogEntry>> {
    let row = sqlx::query(&select_sql("WHERE video_id = ?"))
        .bind(video_id)
        .fetch_optional(pool)
        .await?;
    row.map(entry_from_row).transpose()
}

/// Load a track by library file path
pub async fn find_by_file_path(pool: &SqlitePool, file_path: &str) -> Result<Option<CatalogEntry>> {
    let row = sqlx::query(&select_sql("WHERE file_path = ?"))
        .bind(file_path)
        .fetch_optional(pool)
        .await?;
    row.map(entry_from_row).transpose()
}

/// Case-insensitive artist/title lookup, used as a secondary
/// deduplication check before re-downloading the same song under a
/// different video id.
pub async fn find_by_artist_title(
    pool: &SqlitePool,
    artist: &str,
    title: &str,
) -> Result<Option<CatalogEntry>> {
    let row = sqlx::query(&select_sql(
        "WHERE artist IS NOT NULL AND lower(artist) = lower(?) AND lower(title) = lower(?)",
    ))
    .bind(artist)
    .bind(title)
    .fetch_optional(pool)
    .await?;
    row.map(entry_from_row).transpose()
}

/// List tracks, optionally filtered by a substring over title/artist.
pub async fn list(pool: &SqlitePool, search: Option<&str>, limit: i64) -> Result<Vec<CatalogEntry>> {
    let rows = match search {
        Some(term) => {
            let pattern = format!("%{}%", term);
            sqlx::query(&select_sql(
                "WHERE title LIKE ? OR artist LIKE ? ORDER BY downloaded_at DESC LIMIT ?",
            ))
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&select_sql("ORDER BY downloaded_at DESC LIMIT ?"))
                .bind(limit)
                .fetch_all(pool)
                .await?
        }
    };
    rows.into_iter().map(entry_from_row).collect()
}

/// Genre frequency for one artist's catalogued tracks, most common
/// first. Feeds the history classification strategy.
pub async fn genre_counts_for_artist(
    pool: &SqlitePool,
    artist: &str,
) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query(
        r#"
        SELECT genre, COUNT(*) as n FROM tracks
        WHERE genre IS NOT NULL AND artist IS NOT NULL AND lower(artist) = lower(?)
        GROUP BY genre
        ORDER BY n DESC
        "#,
    )
    .bind(artist)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get::<String, _>("genre"), row.get::<i64, _>("n")))
        .collect())
}

/// Apply a metadata correction. Absent fields keep their stored value;
/// changing the year also recomputes the decade.
pub async fn update_fields(
    pool: &SqlitePool,
    video_id: &str,
    update: &CatalogUpdate,
) -> Result<Option<CatalogEntry>> {
    let decade = update.year.map(|y| decade_from_year(Some(y)));
    let affected = sqlx::query(
        r#"
        UPDATE tracks SET
            title = COALESCE(?, title),
            artist = COALESCE(?, artist),
            year = COALESCE(?, year),
            genre = COALESCE(?, genre),
            decade = COALESCE(?, decade),
            updated_at = CURRENT_TIMESTAMP
        WHERE video_id = ?
        "#,
    )
    .bind(&update.title)
    .bind(&update.artist)
    .bind(update.year)
    .bind(&update.genre)
    .bind(&decade)
    .bind(video_id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Ok(None);
    }
    find_by_video_id(pool, video_id).await
}

/// Remove a track, returning the removed row so the caller can clean
/// up the file on disk.
pub async fn delete(pool: &SqlitePool, video_id: &str) -> Result<Option<CatalogEntry>> {
    let existing = find_by_video_id(pool, video_id).await?;
    if existing.is_some() {
        sqlx::query("DELETE FROM tracks WHERE video_id = ?")
            .bind(video_id)
            .execute(pool)
            .await?;
    }
    Ok(existing)
}

/// Aggregate counts by genre and decade plus library totals.
pub async fn stats(pool: &SqlitePool) -> Result<CatalogStats> {
    let totals = sqlx::query(
        "SELECT COUNT(*) as n, COALESCE(SUM(file_size), 0) as bytes FROM tracks",
    )
    .fetch_one(pool)
    .await?;

    let genres = sqlx::query(
        r#"
        SELECT COALESCE(genre, 'Unclassified') as g, COUNT(*) as n
        FROM tracks GROUP BY g ORDER BY n DESC
        "#,
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| (row.get::<String, _>("g"), row.get::<i64, _>("n")))
    .collect();

    let decades = sqlx::query(
        r#"
        SELECT COALESCE(decade, 'Unknown') as d, COUNT(*) as n
        FROM tracks GROUP BY d ORDER BY d
        "#,
    )
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|row| (row.get::<String, _>("d"), row.get::<i64, _>("n")))
    .collect();

    Ok(CatalogStats {
        total_tracks: totals.get("n"),
        total_bytes: totals.get("bytes"),
        genres,
        decades,
    })
}

fn select_sql(suffix: &str) -> String {
    format!(
        "SELECT video_id, url, title, artist, year, genre, decade, file_path, \
         file_size, file_type, duration_seconds, bitrate_kbps, source, downloaded_at \
         FROM tracks {suffix}"
    )
}

fn entry_from_row(row: sqlx::sqlite::SqliteRow) -> Result<CatalogEntry> {
    let source_str: String = row.get("source");
    let downloaded_at: Option<String> = row.get("downloaded_at");
    Ok(CatalogEntry {
        video_id: row.get("video_id"),
        url: row.get("url"),
        title: row.get("title"),
        artist: row.get("artist"),
        year: row.get("year"),
        genre: row.get("genre"),
        decade: row.get("decade"),
        file_path: row.get("file_path"),
        file_size: row.get("file_size"),
        file_type: row.get("file_type"),
        duration_seconds: row.get("duration_seconds"),
        bitrate_kbps: row.get("bitrate_kbps"),
        source: DownloadSource::parse(&source_str).unwrap_or(DownloadSource::Direct),
        downloaded_at: downloaded_at.and_then(|s| parse_sqlite_timestamp(&s)),
    })
}

/// SQLite CURRENT_TIMESTAMP produces `YYYY-MM-DD HH:MM:SS` (UTC).
fn parse_sqlite_timestamp(s: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc)))
}
