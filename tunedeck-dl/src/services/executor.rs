//! Download execution with (credential tier × format selector) fallback
//!
//! Attempts walk the format ladder within each credential tier.
//! Format and transport failures advance within the tier; an
//! availability or authentication failure abandons the tier, since a
//! different format will not fix a gone or gated item, but anonymous
//! access sometimes succeeds where stale cookies fail.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::MediaReference;
use crate::services::media::{CredentialProfile, MediaError, MediaService, TransferProgress};

/// Format selector ladder, strongest first. The last entries accept
/// video-only sources whose audio track is extracted anyway.
pub const FORMAT_LADDER: [&str; 5] = [
    "bestaudio/best/worst",
    "bestaudio/best",
    "best/worst",
    "best[height<=720]/best",
    "worst[ext=mp4]/worst",
];

/// A prepared attempt matrix: credential tiers outer, formats inner.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub tiers: Vec<Option<CredentialProfile>>,
    pub formats: Vec<String>,
}

impl DownloadPlan {
    /// The standard plan: authenticated tier first when credentials
    /// exist, then anonymous; the full format ladder in each tier.
    pub fn standard(credentials: Option<CredentialProfile>) -> Self {
        let tiers = match credentials {
            Some(profile) => vec![Some(profile), None],
            None => vec![None],
        };
        Self {
            tiers,
            formats: FORMAT_LADDER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub struct DownloadExecutor {
    media: Arc<dyn MediaService>,
}

impl DownloadExecutor {
    pub fn new(media: Arc<dyn MediaService>) -> Self {
        Self { media }
    }

    /// Run the plan until one attempt produces a file. On exhaustion
    /// the most recent error is returned.
    pub async fn download(
        &self,
        reference: &MediaReference,
        plan: &DownloadPlan,
        output_base: &Path,
        progress: mpsc::Sender<TransferProgress>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let mut last_error = MediaError::Parse("empty download plan".to_string());
        let mut attempt = 0usize;

        for tier in &plan.tiers {
            let tier_name = tier.as_ref().map(|p| p.name.as_str()).unwrap_or("anonymous");
            for format_selector in &plan.formats {
                if cancel.is_cancelled() {
                    return Err(MediaError::Cancelled);
                }
                attempt += 1;
                if attempt > 1 {
                    tracing::info!(
                        "retrying {} (attempt {}, tier {}, format {})",
                        reference.video_id,
                        attempt,
                        tier_name,
                        format_selector
                    );
                }

                match self
                    .media
                    .download(
                        &reference.url,
                        format_selector,
                        tier.as_ref(),
                        output_base,
                        progress.clone(),
                        cancel,
                    )
                    .await
                {
                    Ok(path) => {
                        tracing::info!(
                            "downloaded {} on attempt {} ({} / {})",
                            reference.video_id,
                            attempt,
                            tier_name,
                            format_selector
                        );
                        return Ok(path);
                    }
                    Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                    Err(e) if e.retry_same_tier() => {
                        tracing::warn!(
                            "attempt {} failed for {} ({}): {}",
                            attempt,
                            reference.video_id,
                            format_selector,
                            e
                        );
                        last_error = e;
                    }
                    Err(e) => {
                        // Unavailable or auth-gated: abandon this tier
                        tracing::warn!(
                            "tier {} abandoned for {}: {}",
                            tier_name,
                            reference.video_id,
                            e
                        );
                        last_error = e;
                        break;
                    }
                }
            }
        }
        Err(last_error)
    }
}
