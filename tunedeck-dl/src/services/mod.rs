//! Service layer: media engine access, caching, resolution,
//! classification, download execution, and playlist browsing.

pub mod cache;
pub mod executor;
pub mod genre;
pub mod media;
pub mod playlist;
pub mod resolver;
pub mod tagger;
