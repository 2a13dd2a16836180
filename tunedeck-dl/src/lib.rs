//! tunedeck-dl library interface
//!
//! Exposes the service internals for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tunedeck_common::config::Settings;
use tunedeck_common::events::EventBus;

use crate::services::playlist::PlaylistBrowser;
use crate::workflow::{TaskTracker, WorkerPool};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved runtime settings
    pub settings: Arc<Settings>,
    /// Event bus for state change broadcasts
    pub event_bus: Arc<EventBus>,
    /// In-memory task registry
    pub tracker: Arc<TaskTracker>,
    /// Bounded download queue
    pub workers: WorkerPool,
    /// Playlist browsing service
    pub browser: Arc<PlaylistBrowser>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        settings: Arc<Settings>,
        event_bus: Arc<EventBus>,
        tracker: Arc<TaskTracker>,
        workers: WorkerPool,
        browser: Arc<PlaylistBrowser>,
    ) -> Self {
        Self {
            db,
            settings,
            event_bus,
            tracker,
            workers,
            browser,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::download_routes())
        .merge(api::playlist_routes())
        .merge(api::catalog_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
