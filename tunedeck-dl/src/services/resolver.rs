//! Metadata resolution cascade
//!
//! Resolution order: cache, full extraction with credentials, flat
//! extraction with the same credentials, flat extraction anonymous
//! (the credential profile itself may be stale). The first success is
//! cached and returned; flat results are still cached since a degraded
//! title beats re-asking the provider.

use std::sync::Arc;

use crate::models::{MediaReference, ResolvedMetadata};
use crate::services::cache::CacheStore;
use crate::services::media::{CredentialProfile, ExtractionMode, MediaError, MediaService};

pub struct MetadataResolver {
    media: Arc<dyn MediaService>,
    cache: Arc<CacheStore>,
    credentials: Option<CredentialProfile>,
}

impl MetadataResolver {
    pub fn new(
        media: Arc<dyn MediaService>,
        cache: Arc<CacheStore>,
        credentials: Option<CredentialProfile>,
    ) -> Self {
        Self {
            media,
            cache,
            credentials,
        }
    }

    pub async fn resolve(&self, reference: &MediaReference) -> Result<ResolvedMetadata, MediaError> {
        if let Some(hit) = self.cache.resolved(&reference.video_id).await {
            tracing::debug!("metadata cache hit for {}", reference.video_id);
            return Ok(hit);
        }

        let mut attempts: Vec<(ExtractionMode, Option<&CredentialProfile>)> = Vec::new();
        match &self.credentials {
            Some(profile) => {
                attempts.push((ExtractionMode::Full, Some(profile)));
                attempts.push((ExtractionMode::Flat, Some(profile)));
            }
            None => attempts.push((ExtractionMode::Full, None)),
        }
        attempts.push((ExtractionMode::Flat, None));

        let mut last_error = MediaError::Parse("no resolution attempts".to_string());
        for (mode, credentials) in attempts {
            match self.media.fetch_metadata(&reference.url, mode, credentials).await {
                Ok(metadata) if !metadata.title.is_empty() => {
                    self.cache.store_resolved(&reference.video_id, &metadata).await;
                    return Ok(metadata);
                }
                Ok(_) => {
                    tracing::warn!(
                        "empty metadata for {} ({:?}), falling back",
                        reference.video_id,
                        mode
                    );
                    last_error = MediaError::Parse("provider returned empty title".to_string());
                }
                Err(MediaError::ItemUnavailable(msg)) => {
                    // The item is gone; no weaker extraction will help
                    tracing::warn!("{} unavailable: {}", reference.video_id, msg);
                    return Err(MediaError::ItemUnavailable(msg));
                }
                Err(e) => {
                    tracing::warn!(
                        "metadata fetch failed for {} ({:?} / {}): {}",
                        reference.video_id,
                        mode,
                        credentials.map(|c| c.name.as_str()).unwrap_or("anonymous"),
                        e
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
