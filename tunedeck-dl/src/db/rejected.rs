//! Sticky rejection store
//!
//! A rejected reference survives restarts and blocks re-submission
//! until explicitly un-rejected.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, Serialize)]
pub struct RejectedReference {
    pub video_id: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
}

/// Mark a reference rejected. Re-rejecting is a no-op; returns whether
/// a new rejection was recorded.
pub async fn reject(
    pool: &SqlitePool,
    video_id: &str,
    url: Option<&str>,
    title: Option<&str>,
    reason: Option<&str>,
) -> Result<bool> {
    let affected = sqlx::query(
        r#"
        INSERT INTO rejected_references (video_id, url, title, reason, rejected_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(video_id) DO NOTHING
        "#,
    )
    .bind(video_id)
    .bind(url)
    .bind(title)
    .bind(reason)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(affected > 0)
}

/// Remove a rejection; returns whether one existed.
pub async fn unreject(pool: &SqlitePool, video_id: &str) -> Result<bool> {
    let affected = sqlx::query("DELETE FROM rejected_references WHERE video_id = ?")
        .bind(video_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

pub async fn is_rejected(pool: &SqlitePool, video_id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM rejected_references WHERE video_id = ?")
        .bind(video_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn list(pool: &SqlitePool, limit: i64) -> Result<Vec<RejectedReference>> {
    let rows = sqlx::query(
        r#"
        SELECT video_id, url, title, reason, rejected_at
        FROM rejected_references
        ORDER BY rejected_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let rejected_at: Option<String> = row.get("rejected_at");
            RejectedReference {
                video_id: row.get("video_id"),
                url: row.get("url"),
                title: row.get("title"),
                reason: row.get("reason"),
                rejected_at: rejected_at.and_then(|s| {
                    chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                }),
            }
        })
        .collect())
}
