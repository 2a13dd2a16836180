//! Shared types for the TuneDeck services
//!
//! Provides the common error type, configuration loading, and the
//! broadcast event bus used by the downloader daemon.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
