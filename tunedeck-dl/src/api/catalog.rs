//! Catalog API handlers
//!
//! GET /catalog, GET /catalog/stats, PATCH /catalog/:video_id,
//! DELETE /catalog/:video_id, POST /catalog/import

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{
    self,
    catalog::{CatalogEntry, CatalogStats, CatalogUpdate, RegisterOutcome},
    history::HistoryAction,
};
use crate::error::{ApiError, ApiResult};
use crate::models::metadata::decade_from_year;
use crate::models::DownloadSource;
use crate::services::tagger;
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn list_catalog(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<CatalogEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 1000);
    let entries = db::catalog::list(&state.db, query.search.as_deref(), limit).await?;
    Ok(Json(entries))
}

pub async fn catalog_stats(State(state): State<AppState>) -> ApiResult<Json<CatalogStats>> {
    Ok(Json(db::catalog::stats(&state.db).await?))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Json(update): Json<CatalogUpdate>,
) -> ApiResult<Json<CatalogEntry>> {
    let updated = db::catalog::update_fields(&state.db, &video_id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Track {video_id} not in catalog")))?;
    Ok(Json(updated))
}

/// DELETE /catalog/:video_id response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub video_id: String,
    pub file_path: String,
    pub file_removed: bool,
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let removed = db::catalog::delete(&state.db, &video_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Track {video_id} not in catalog")))?;

    // File removal is best effort; the catalog row is already gone
    let file_removed = match tokio::fs::remove_file(&removed.file_path).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("could not remove {}: {}", removed.file_path, e);
            false
        }
    };

    db::history::record(&state.db, &video_id, HistoryAction::Deleted, None).await?;

    Ok(Json(DeleteResponse {
        video_id,
        file_path: removed.file_path,
        file_removed,
    }))
}

/// POST /catalog/import request
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub file_path: String,
    #[serde(default)]
    pub video_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
}

/// Register a file already on disk without downloading anything.
pub async fn import_file(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<(StatusCode, Json<CatalogEntry>)> {
    let path = std::path::Path::new(&request.file_path);
    if !path.is_file() {
        return Err(ApiError::BadRequest(format!(
            "File does not exist: {}",
            request.file_path
        )));
    }

    if let Some(existing) = db::catalog::find_by_file_path(&state.db, &request.file_path).await? {
        return Err(ApiError::Conflict(format!(
            "File already catalogued as {}",
            existing.video_id
        )));
    }

    let video_id = request
        .video_id
        .unwrap_or_else(|| format!("local-{}", uuid::Uuid::new_v4()));

    let properties = match tagger::read_properties(path) {
        Ok(props) => Some(props),
        Err(e) => {
            tracing::debug!("could not probe {}: {}", request.file_path, e);
            None
        }
    };
    let file_size = tokio::fs::metadata(path).await.ok().map(|m| m.len() as i64);
    let file_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("mp3")
        .to_ascii_uppercase();

    let entry = CatalogEntry {
        video_id: video_id.clone(),
        url: format!("file://{}", request.file_path),
        title: request.title,
        artist: request.artist,
        year: request.year,
        genre: request.genre,
        decade: Some(decade_from_year(request.year)),
        file_path: request.file_path,
        file_size,
        file_type,
        duration_seconds: properties.map(|p| p.duration_seconds),
        bitrate_kbps: properties.and_then(|p| p.bitrate_kbps),
        source: DownloadSource::Import,
        downloaded_at: None,
    };

    match db::catalog::register(&state.db, &entry).await? {
        RegisterOutcome::Registered => {}
        RegisterOutcome::Conflict(_) => {
            return Err(ApiError::Conflict(format!(
                "Track {video_id} or its file path is already catalogued"
            )));
        }
    }
    db::history::record(&state.db, &video_id, HistoryAction::Imported, None).await?;

    let stored = db::catalog::find_by_video_id(&state.db, &video_id)
        .await?
        .ok_or_else(|| ApiError::Internal("imported row vanished".to_string()))?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog", get(list_catalog))
        .route("/catalog/stats", get(catalog_stats))
        .route("/catalog/import", post(import_file))
        .route("/catalog/:video_id", patch(update_entry).delete(delete_entry))
}
