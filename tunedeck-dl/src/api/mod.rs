//! HTTP API handlers for tunedeck-dl

pub mod catalog;
pub mod downloads;
pub mod health;
pub mod playlist;

pub use catalog::catalog_routes;
pub use downloads::download_routes;
pub use health::health_routes;
pub use playlist::playlist_routes;
