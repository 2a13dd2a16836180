//! Credential tier and format ladder fallback behavior.

mod support;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tunedeck_dl::models::MediaReference;
use tunedeck_dl::services::executor::{DownloadExecutor, DownloadPlan, FORMAT_LADDER};
use tunedeck_dl::services::media::{CredentialProfile, MediaError};

use support::ScriptedMedia;

fn anonymous_plan() -> DownloadPlan {
    DownloadPlan::standard(None)
}

fn authenticated_plan() -> DownloadPlan {
    DownloadPlan::standard(Some(CredentialProfile {
        name: "default".to_string(),
        cookies_file: PathBuf::from("/tmp/cookies.txt"),
    }))
}

async fn run(
    media: &Arc<ScriptedMedia>,
    plan: &DownloadPlan,
    output_base: &std::path::Path,
    cancel: &CancellationToken,
) -> Result<PathBuf, MediaError> {
    let dyn_media: Arc<dyn tunedeck_dl::services::media::MediaService> = media.clone();
    let executor = DownloadExecutor::new(dyn_media);
    let reference = MediaReference::from_video_id("dQw4w9WgXcQ").unwrap();
    let (tx, mut rx) = mpsc::channel(32);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    executor
        .download(&reference, plan, output_base, tx, cancel)
        .await
}

#[tokio::test]
async fn ladder_advances_past_format_failures() {
    let media = Arc::new(ScriptedMedia::new());
    for _ in 0..3 {
        media.push_download(Err(MediaError::FormatUnavailable(
            "Requested format is not available".to_string(),
        )));
    }
    media.push_download(Ok(()));

    let dir = tempfile::tempdir().unwrap();
    let path = run(&media, &anonymous_plan(), &dir.path().join("song"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(media.downloads(), 4);
    assert!(path.is_file());
}

#[tokio::test]
async fn auth_failure_abandons_tier_not_plan() {
    let media = Arc::new(ScriptedMedia::new());
    // First attempt in the credentialed tier hits an auth wall; the
    // anonymous tier succeeds on its first format.
    media.push_download(Err(MediaError::Auth("Sign in to confirm".to_string())));
    media.push_download(Ok(()));

    let dir = tempfile::tempdir().unwrap();
    let path = run(&media, &authenticated_plan(), &dir.path().join("song"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(media.downloads(), 2);
    assert!(path.is_file());
}

#[tokio::test]
async fn exhausted_plan_returns_last_error() {
    let media = Arc::new(ScriptedMedia::new());
    for _ in 0..FORMAT_LADDER.len() {
        media.push_download(Err(MediaError::Network("timed out".to_string())));
    }

    let dir = tempfile::tempdir().unwrap();
    let err = run(&media, &anonymous_plan(), &dir.path().join("song"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(media.downloads(), FORMAT_LADDER.len());
    assert!(matches!(err, MediaError::Network(_)));
}

#[tokio::test]
async fn unavailable_item_stops_both_tiers() {
    let media = Arc::new(ScriptedMedia::new());
    media.push_download(Err(MediaError::ItemUnavailable(
        "Private video".to_string(),
    )));
    media.push_download(Err(MediaError::ItemUnavailable(
        "Private video".to_string(),
    )));

    let dir = tempfile::tempdir().unwrap();
    let err = run(&media, &authenticated_plan(), &dir.path().join("song"), &CancellationToken::new())
        .await
        .unwrap_err();
    // One attempt per tier, never a second format within a tier
    assert_eq!(media.downloads(), 2);
    assert!(matches!(err, MediaError::ItemUnavailable(_)));
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let media = Arc::new(ScriptedMedia::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let dir = tempfile::tempdir().unwrap();
    let err = run(&media, &anonymous_plan(), &dir.path().join("song"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(media.downloads(), 0);
    assert!(matches!(err, MediaError::Cancelled));
}
