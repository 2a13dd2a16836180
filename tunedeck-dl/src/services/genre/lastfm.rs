//! Last.fm track.getInfo strategy
//!
//! Works with or without an API key; without one the endpoint usually
//! rejects the call, which simply becomes a pass.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::musicbrainz::title_case;
use super::{ClassifyContext, GenreStrategy};
use crate::models::GenreSource;

const API_URL: &str = "http://ws.audioscrobbler.com/2.0/";
const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct TrackInfoResponse {
    track: Option<TrackInfo>,
}

#[derive(Debug, Deserialize)]
struct TrackInfo {
    toptags: Option<TopTags>,
}

#[derive(Debug, Deserialize)]
struct TopTags {
    #[serde(default)]
    tag: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

pub struct LastFmStrategy {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl LastFmStrategy {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    async fn top_tag(&self, artist: &str, track: &str) -> Option<String> {
        let mut params: Vec<(&str, &str)> = vec![
            ("method", "track.getInfo"),
            ("artist", artist),
            ("track", track),
            ("format", "json"),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key));
        }

        let response = self
            .http
            .get(API_URL)
            .query(&params)
            .timeout(TIMEOUT)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            tracing::debug!("Last.fm returned {}", response.status());
            return None;
        }
        let data: TrackInfoResponse = response.json().await.ok()?;
        data.track?
            .toptags?
            .tag
            .into_iter()
            .map(|t| title_case(&t.name))
            .find(|name| name.len() > 2)
    }
}

#[async_trait]
impl GenreStrategy for LastFmStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::ExternalRegistry
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        let artist = ctx.fields.artist.as_deref()?;
        self.top_tag(artist, &ctx.fields.title).await
    }
}
