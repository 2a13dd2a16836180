//! Append-only download history log

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// Actions recorded in the history log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Downloaded,
    Skipped,
    Rejected,
    Unrejected,
    Deleted,
    Imported,
    Failed,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Downloaded => "downloaded",
            HistoryAction::Skipped => "skipped",
            HistoryAction::Rejected => "rejected",
            HistoryAction::Unrejected => "unrejected",
            HistoryAction::Deleted => "deleted",
            HistoryAction::Imported => "imported",
            HistoryAction::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub video_id: String,
    pub action: String,
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

pub async fn record(
    pool: &SqlitePool,
    video_id: &str,
    action: HistoryAction,
    notes: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO download_history (video_id, action, notes, recorded_at) VALUES (?, ?, ?, CURRENT_TIMESTAMP)",
    )
    .bind(video_id)
    .bind(action.as_str())
    .bind(notes)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn for_video(pool: &SqlitePool, video_id: &str) -> Result<Vec<HistoryRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT video_id, action, notes, recorded_at FROM download_history
        WHERE video_id = ? ORDER BY id DESC
        "#,
    )
    .bind(video_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let recorded_at: Option<String> = row.get("recorded_at");
            HistoryRecord {
                video_id: row.get("video_id"),
                action: row.get("action"),
                notes: row.get("notes"),
                recorded_at: recorded_at.and_then(|s| {
                    chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|naive| naive.and_utc())
                }),
            }
        })
        .collect())
}
