//! Multi-source genre classification cascade
//!
//! Strategies run in a fixed order from cheapest to most expensive:
//! catalog history, hashtags, provider tags, channel name, title
//! keywords, deep description analysis, external registries (Last.fm,
//! MusicBrainz), and finally a web search. The first hit wins and is
//! cached; network strategies swallow their own failures and simply
//! pass.

mod audio;
mod heuristics;
mod history;
mod lastfm;
mod musicbrainz;
mod vocab;
mod websearch;

pub use audio::{AnalyzerError, AudioAnalyzer};
pub use heuristics::{
    ChannelStrategy, DescriptionDeepStrategy, HashtagStrategy, TagsStrategy, TitleKeywordStrategy,
};
pub use history::HistoryStrategy;
pub use lastfm::LastFmStrategy;
pub use musicbrainz::MusicBrainzStrategy;
pub use vocab::GenreVocabulary;
pub use websearch::WebSearchStrategy;

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::models::{ExtractedFields, GenreResult, GenreSource, ResolvedMetadata};
use crate::services::cache::CacheStore;

/// Everything a strategy may consult for one reference.
pub struct ClassifyContext<'a> {
    pub video_id: &'a str,
    pub fields: &'a ExtractedFields,
    pub metadata: &'a ResolvedMetadata,
}

/// One source in the classification cascade.
#[async_trait]
pub trait GenreStrategy: Send + Sync {
    fn source(&self) -> GenreSource;

    /// Attempt a classification. `None` means "pass to the next
    /// strategy"; strategies never surface errors to the cascade.
    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String>;
}

pub struct GenreClassifier {
    strategies: Vec<Box<dyn GenreStrategy>>,
    cache: Arc<CacheStore>,
}

impl GenreClassifier {
    /// Build the default cascade.
    pub fn new(
        pool: SqlitePool,
        cache: Arc<CacheStore>,
        http: reqwest::Client,
        lastfm_api_key: Option<String>,
    ) -> Self {
        let vocab = GenreVocabulary::builtin();
        let strategies: Vec<Box<dyn GenreStrategy>> = vec![
            Box::new(HistoryStrategy::new(pool)),
            Box::new(HashtagStrategy::new(vocab)),
            Box::new(TagsStrategy::new(vocab)),
            Box::new(ChannelStrategy::new(vocab)),
            Box::new(TitleKeywordStrategy::new(vocab)),
            Box::new(DescriptionDeepStrategy::new(vocab)),
            Box::new(LastFmStrategy::new(http.clone(), lastfm_api_key)),
            Box::new(MusicBrainzStrategy::new(http.clone())),
            Box::new(WebSearchStrategy::new(http, vocab)),
        ];
        Self { strategies, cache }
    }

    /// Custom cascade, used by tests and alternative configurations.
    pub fn with_strategies(strategies: Vec<Box<dyn GenreStrategy>>, cache: Arc<CacheStore>) -> Self {
        Self { strategies, cache }
    }

    /// Run the cascade for a reference. Cached results short-circuit.
    pub async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<GenreResult> {
        if let Some(hit) = self.cache.genre(ctx.video_id).await {
            tracing::debug!("genre cache hit for {}: {}", ctx.video_id, hit.genre);
            return Some(hit);
        }

        for strategy in &self.strategies {
            if let Some(genre) = strategy.classify(ctx).await {
                let result = GenreResult {
                    genre,
                    source: strategy.source(),
                };
                tracing::info!(
                    "classified {} as {} (source: {})",
                    ctx.video_id,
                    result.genre,
                    result.source.as_str()
                );
                self.cache.store_genre(ctx.video_id, &result).await;
                return Some(result);
            }
        }
        tracing::info!("no genre found for {}", ctx.video_id);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        source: GenreSource,
        answer: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GenreStrategy for Scripted {
        fn source(&self) -> GenreSource {
            self.source
        }

        async fn classify(&self, _ctx: &ClassifyContext<'_>) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.map(str::to_string)
        }
    }

    fn ctx_parts() -> (ExtractedFields, ResolvedMetadata) {
        (
            ExtractedFields {
                artist: Some("Daft Punk".to_string()),
                title: "Around The World".to_string(),
                year: Some(1997),
                genre: None,
            },
            ResolvedMetadata::default(),
        )
    }

    #[tokio::test]
    async fn first_hit_short_circuits() {
        let cache = Arc::new(CacheStore::new(test_pool().await));
        let miss_calls = Arc::new(AtomicUsize::new(0));
        let hit_calls = Arc::new(AtomicUsize::new(0));
        let later_calls = Arc::new(AtomicUsize::new(0));

        let classifier = GenreClassifier::with_strategies(
            vec![
                Box::new(Scripted {
                    source: GenreSource::History,
                    answer: None,
                    calls: miss_calls.clone(),
                }),
                Box::new(Scripted {
                    source: GenreSource::TitleKeyword,
                    answer: Some("House"),
                    calls: hit_calls.clone(),
                }),
                Box::new(Scripted {
                    source: GenreSource::WebSearch,
                    answer: Some("Wrong"),
                    calls: later_calls.clone(),
                }),
            ],
            cache,
        );

        let (fields, metadata) = ctx_parts();
        let ctx = ClassifyContext {
            video_id: "vid1",
            fields: &fields,
            metadata: &metadata,
        };
        let result = classifier.classify(&ctx).await.unwrap();
        assert_eq!(result.genre, "House");
        assert_eq!(result.source, GenreSource::TitleKeyword);
        assert_eq!(miss_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cached_result_skips_strategies() {
        let cache = Arc::new(CacheStore::new(test_pool().await));
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = GenreClassifier::with_strategies(
            vec![Box::new(Scripted {
                source: GenreSource::TitleKeyword,
                answer: Some("Techno"),
                calls: calls.clone(),
            })],
            cache,
        );

        let (fields, metadata) = ctx_parts();
        let ctx = ClassifyContext {
            video_id: "vid1",
            fields: &fields,
            metadata: &metadata,
        };
        classifier.classify(&ctx).await.unwrap();
        let second = classifier.classify(&ctx).await.unwrap();
        assert_eq!(second.genre, "Techno");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_cascade_returns_none() {
        let cache = Arc::new(CacheStore::new(test_pool().await));
        let classifier = GenreClassifier::with_strategies(
            vec![Box::new(Scripted {
                source: GenreSource::History,
                answer: None,
                calls: Arc::new(AtomicUsize::new(0)),
            })],
            cache,
        );
        let (fields, metadata) = ctx_parts();
        let ctx = ClassifyContext {
            video_id: "vid1",
            fields: &fields,
            metadata: &metadata,
        };
        assert!(classifier.classify(&ctx).await.is_none());
    }
}
