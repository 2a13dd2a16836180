//! Playlist browsing and rejection API handlers
//!
//! GET /playlist, GET /rejections, POST /rejections,
//! DELETE /rejections/:video_id

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::db::{self, history::HistoryAction, rejected::RejectedReference};
use crate::error::{ApiError, ApiResult};
use crate::models::MediaReference;
use crate::services::playlist::PlaylistItem;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaylistQuery {
    pub url: String,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Include entries that are already catalogued or rejected
    #[serde(default)]
    pub show_hidden: bool,
}

pub async fn browse_playlist(
    State(state): State<AppState>,
    Query(query): Query<PlaylistQuery>,
) -> ApiResult<Json<Vec<PlaylistItem>>> {
    let url = Url::parse(&query.url)
        .map_err(|e| ApiError::BadRequest(format!("Invalid playlist url: {e}")))?;
    let limit = query
        .limit
        .unwrap_or(state.settings.playlist_limit)
        .clamp(1, 500);
    let items = state.browser.list(&url, limit, query.show_hidden).await?;
    Ok(Json(items))
}

/// POST /rejections request
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RejectResponse {
    pub video_id: String,
    /// False when the reference was already rejected
    pub newly_rejected: bool,
}

pub async fn reject_reference(
    State(state): State<AppState>,
    Json(request): Json<RejectRequest>,
) -> ApiResult<(StatusCode, Json<RejectResponse>)> {
    let reference = match (&request.url, &request.video_id) {
        (Some(url), _) => {
            MediaReference::from_url(url).map_err(|e| ApiError::BadRequest(e.to_string()))?
        }
        (None, Some(video_id)) => {
            MediaReference::from_video_id(video_id).map_err(|e| ApiError::BadRequest(e.to_string()))?
        }
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either url or video_id is required".to_string(),
            ))
        }
    };

    let newly_rejected = db::rejected::reject(
        &state.db,
        &reference.video_id,
        Some(reference.url_str()),
        request.title.as_deref(),
        request.reason.as_deref(),
    )
    .await?;
    if newly_rejected {
        db::history::record(
            &state.db,
            &reference.video_id,
            HistoryAction::Rejected,
            request.reason.as_deref(),
        )
        .await?;
        state
            .event_bus
            .emit_lossy(tunedeck_common::events::DeckEvent::RejectionChanged {
                video_id: reference.video_id.clone(),
                rejected: true,
                timestamp: chrono::Utc::now(),
            });
    }

    Ok((
        StatusCode::CREATED,
        Json(RejectResponse {
            video_id: reference.video_id,
            newly_rejected,
        }),
    ))
}

pub async fn unreject_reference(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<RejectResponse>> {
    let lifted = db::rejected::unreject(&state.db, &video_id).await?;
    if !lifted {
        return Err(ApiError::NotFound(format!(
            "Reference {video_id} is not rejected"
        )));
    }
    db::history::record(&state.db, &video_id, HistoryAction::Unrejected, None).await?;
    state
        .event_bus
        .emit_lossy(tunedeck_common::events::DeckEvent::RejectionChanged {
            video_id: video_id.clone(),
            rejected: false,
            timestamp: chrono::Utc::now(),
        });

    Ok(Json(RejectResponse {
        video_id,
        newly_rejected: false,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RejectionListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn list_rejections(
    State(state): State<AppState>,
    Query(query): Query<RejectionListQuery>,
) -> ApiResult<Json<Vec<RejectedReference>>> {
    let limit = query.limit.unwrap_or(200).clamp(1, 1000);
    Ok(Json(db::rejected::list(&state.db, limit).await?))
}

pub fn playlist_routes() -> Router<AppState> {
    Router::new()
        .route("/playlist", get(browse_playlist))
        .route("/rejections", get(list_rejections).post(reject_reference))
        .route("/rejections/:video_id", delete(unreject_reference))
}
