//! MusicBrainz recording search strategy
//!
//! No API key required, but the public endpoint enforces one request
//! per second; the limiter serializes our calls accordingly. Every
//! failure path resolves to a pass.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{ClassifyContext, GenreStrategy};
use crate::models::GenreSource;

const SEARCH_URL: &str = "https://musicbrainz.org/ws/2/recording/";
const USER_AGENT: &str = "tunedeck-dl/0.1 (https://github.com/tunedeck/tunedeck)";
const RATE_LIMIT_MS: u64 = 1000;
const TIMEOUT: Duration = Duration::from_secs(5);

struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
    #[serde(default)]
    count: i64,
}

pub struct MusicBrainzStrategy {
    http: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
}

impl MusicBrainzStrategy {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        }
    }

    async fn top_tag(&self, artist: &str, track: &str) -> Option<String> {
        self.rate_limiter.wait().await;

        let query = format!("artist:\"{artist}\" AND recording:\"{track}\"");
        let response = self
            .http
            .get(SEARCH_URL)
            .query(&[("query", query.as_str()), ("fmt", "json"), ("limit", "1")])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(TIMEOUT)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            tracing::debug!("MusicBrainz returned {}", response.status());
            return None;
        }
        let data: SearchResponse = response.json().await.ok()?;
        let recording = data.recordings.into_iter().next()?;

        let mut tags = recording.tags;
        tags.sort_by_key(|t| std::cmp::Reverse(t.count));
        tags.into_iter()
            .map(|t| title_case(&t.name))
            .find(|name| name.len() > 2)
    }
}

#[async_trait]
impl GenreStrategy for MusicBrainzStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::ExternalRegistry
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        let artist = ctx.fields.artist.as_deref()?;
        self.top_tag(artist, &ctx.fields.title).await
    }
}

/// Uppercase the first letter of each whitespace-separated word.
pub(super) fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
