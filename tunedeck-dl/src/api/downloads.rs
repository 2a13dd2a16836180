//! Download task API handlers
//!
//! POST /downloads, GET /downloads, GET /downloads/:task_id,
//! POST /downloads/:task_id/cancel

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, history::HistoryAction};
use crate::error::{ApiError, ApiResult};
use crate::models::{DownloadSource, DownloadTask, MediaReference, TaskState};
use crate::workflow::pool::{DownloadJob, SubmitError};
use crate::AppState;

/// POST /downloads request
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Override a sticky rejection and lift it
    #[serde(default)]
    pub force: bool,
}

/// POST /downloads response
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: Uuid,
    pub video_id: String,
    pub state: TaskState,
}

pub async fn submit_download(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let reference = derive_reference(&request)?;
    let video_id = reference.video_id.clone();

    let source = match request.source.as_deref() {
        Some(raw) => DownloadSource::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown source: {raw}")))?,
        None => DownloadSource::Direct,
    };

    if db::rejected::is_rejected(&state.db, &video_id).await? {
        if !request.force {
            return Err(ApiError::Conflict(format!(
                "Reference {video_id} is rejected; resubmit with force to lift"
            )));
        }
        db::rejected::unreject(&state.db, &video_id).await?;
        db::history::record(
            &state.db,
            &video_id,
            HistoryAction::Unrejected,
            Some("lifted by forced submission"),
        )
        .await?;
    }

    // An in-flight task for the same reference is returned as-is
    if let Some(existing) = state.tracker.active_task_for(&video_id) {
        return Ok((
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                task_id: existing.task_id,
                video_id,
                state: existing.state,
            }),
        ));
    }

    let task = DownloadTask::new(reference.clone(), source);
    let task_id = task.task_id;
    state.tracker.insert(task);

    let job = DownloadJob {
        task_id,
        reference,
        source,
    };
    if let Err(e) = state.workers.submit(job) {
        state.tracker.cancel(task_id);
        return Err(match e {
            SubmitError::QueueFull => ApiError::Busy("download queue is full".to_string()),
            SubmitError::Shutdown => {
                ApiError::Internal("download workers are not running".to_string())
            }
        });
    }

    tracing::info!(task_id = %task_id, video_id = %video_id, "download queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id,
            video_id,
            state: TaskState::Queued,
        }),
    ))
}

pub async fn list_downloads(State(state): State<AppState>) -> Json<Vec<DownloadTask>> {
    Json(state.tracker.all())
}

pub async fn download_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<DownloadTask>> {
    // Polled frequently by clients, keep it quiet
    tracing::trace!(task_id = %task_id, "status poll");
    state
        .tracker
        .snapshot(task_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task {task_id} not found")))
}

pub async fn cancel_download(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<DownloadTask>> {
    if state.tracker.snapshot(task_id).is_none() {
        return Err(ApiError::NotFound(format!("Task {task_id} not found")));
    }
    state.tracker.cancel(task_id);
    let task = state
        .tracker
        .snapshot(task_id)
        .ok_or_else(|| ApiError::NotFound(format!("Task {task_id} not found")))?;
    Ok(Json(task))
}

fn derive_reference(request: &SubmitRequest) -> ApiResult<MediaReference> {
    match (&request.url, &request.video_id) {
        (Some(url), _) => {
            MediaReference::from_url(url).map_err(|e| ApiError::BadRequest(e.to_string()))
        }
        (None, Some(video_id)) => {
            MediaReference::from_video_id(video_id).map_err(|e| ApiError::BadRequest(e.to_string()))
        }
        (None, None) => Err(ApiError::BadRequest(
            "Either url or video_id is required".to_string(),
        )),
    }
}

pub fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/downloads", post(submit_download).get(list_downloads))
        .route("/downloads/:task_id", get(download_status))
        .route("/downloads/:task_id/cancel", post(cancel_download))
}
