//! Web search fallback strategy
//!
//! Last resort before giving up on text sources: run a few search
//! queries through the DuckDuckGo HTML endpoint and scan the result
//! page for vocabulary keywords.

use async_trait::async_trait;
use std::time::Duration;

use super::{ClassifyContext, GenreStrategy, GenreVocabulary};
use crate::models::GenreSource;

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebSearchStrategy {
    http: reqwest::Client,
    vocab: &'static GenreVocabulary,
}

impl WebSearchStrategy {
    pub fn new(http: reqwest::Client, vocab: &'static GenreVocabulary) -> Self {
        Self { http, vocab }
    }

    async fn search(&self, query: &str) -> Option<String> {
        let url = format!("{}?q={}", SEARCH_URL, urlencoding::encode(query));
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(TIMEOUT)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body = response.text().await.ok()?;
        self.vocab.match_text(&body).map(str::to_string)
    }
}

#[async_trait]
impl GenreStrategy for WebSearchStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::WebSearch
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        let artist = ctx.fields.artist.as_deref()?;
        let track = &ctx.fields.title;
        let queries = [
            format!("{artist} {track} genre"),
            format!("{artist} {track} music style"),
            format!("{artist} genre"),
        ];
        for query in &queries {
            if let Some(genre) = self.search(query).await {
                return Some(genre);
            }
        }
        None
    }
}
