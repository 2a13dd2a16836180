//! Key/value settings persistence

use anyhow::Result;
use sqlx::{Row, SqlitePool};

pub const LASTFM_API_KEY: &str = "lastfm_api_key";

pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("value")))
}

pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn set_then_get_overwrites() {
        let pool = test_pool().await;
        set(&pool, LASTFM_API_KEY, "abc").await.unwrap();
        set(&pool, LASTFM_API_KEY, "def").await.unwrap();
        assert_eq!(get(&pool, LASTFM_API_KEY).await.unwrap().as_deref(), Some("def"));
        assert!(get(&pool, "missing").await.unwrap().is_none());
    }
}
