//! Local text heuristics: hashtags, provider tags, channel name,
//! title keywords, and deep description analysis.

use async_trait::async_trait;

use super::{ClassifyContext, GenreStrategy, GenreVocabulary};
use crate::models::GenreSource;

/// Compact hashtag scan over description and provider tags.
pub struct HashtagStrategy {
    vocab: &'static GenreVocabulary,
}

impl HashtagStrategy {
    pub fn new(vocab: &'static GenreVocabulary) -> Self {
        Self { vocab }
    }
}

#[async_trait]
impl GenreStrategy for HashtagStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::Hashtag
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        let mut text = ctx.metadata.description.clone();
        for tag in &ctx.metadata.tags {
            text.push(' ');
            text.push_str(tag);
        }
        self.vocab.match_hashtags(&text).map(str::to_string)
    }
}

/// Word-boundary scan over the provider's tag list.
pub struct TagsStrategy {
    vocab: &'static GenreVocabulary,
}

impl TagsStrategy {
    pub fn new(vocab: &'static GenreVocabulary) -> Self {
        Self { vocab }
    }
}

#[async_trait]
impl GenreStrategy for TagsStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::Tags
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        if ctx.metadata.tags.is_empty() {
            return None;
        }
        let joined = ctx.metadata.tags.join(" ");
        self.vocab.match_text(&joined).map(str::to_string)
    }
}

/// Channel and uploader names often carry the genre outright.
pub struct ChannelStrategy {
    vocab: &'static GenreVocabulary,
}

impl ChannelStrategy {
    pub fn new(vocab: &'static GenreVocabulary) -> Self {
        Self { vocab }
    }
}

#[async_trait]
impl GenreStrategy for ChannelStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::Channel
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        let mut text = String::new();
        if let Some(uploader) = &ctx.metadata.uploader {
            text.push_str(uploader);
        }
        if let Some(channel) = &ctx.metadata.channel {
            text.push(' ');
            text.push_str(channel);
        }
        if text.trim().is_empty() {
            return None;
        }
        self.vocab.match_channel(&text).map(str::to_string)
    }
}

/// Keyword scan over the full original title.
pub struct TitleKeywordStrategy {
    vocab: &'static GenreVocabulary,
}

impl TitleKeywordStrategy {
    pub fn new(vocab: &'static GenreVocabulary) -> Self {
        Self { vocab }
    }
}

#[async_trait]
impl GenreStrategy for TitleKeywordStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::TitleKeyword
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        self.vocab.match_text(&ctx.metadata.title).map(str::to_string)
    }
}

/// Deep description analysis: labeled segments (`Genre: ...`,
/// `Style: ...`) are searched first, then the raw description text.
pub struct DescriptionDeepStrategy {
    vocab: &'static GenreVocabulary,
}

impl DescriptionDeepStrategy {
    pub fn new(vocab: &'static GenreVocabulary) -> Self {
        Self { vocab }
    }

    fn labeled_segments(description: &str) -> Vec<String> {
        const LABELS: [&str; 5] = ["genre:", "style:", "category:", "categoria:", "type:"];
        let mut segments = Vec::new();
        for line in description.lines() {
            let lower = line.to_lowercase();
            for label in LABELS {
                if let Some(pos) = lower.find(label) {
                    let rest = &line[pos + label.len()..];
                    // A labeled value ends at the next delimiter
                    let value: &str = rest
                        .split(|c| matches!(c, ',' | '.' | ';' | '|'))
                        .next()
                        .unwrap_or(rest);
                    if !value.trim().is_empty() {
                        segments.push(value.trim().to_string());
                    }
                }
            }
        }
        segments
    }
}

#[async_trait]
impl GenreStrategy for DescriptionDeepStrategy {
    fn source(&self) -> GenreSource {
        GenreSource::DescriptionDeep
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Option<String> {
        let description = &ctx.metadata.description;
        if description.is_empty() {
            return None;
        }
        for segment in Self::labeled_segments(description) {
            if let Some(genre) = self.vocab.match_text(&segment) {
                return Some(genre.to_string());
            }
        }
        self.vocab.match_text(description).map(str::to_string)
    }
}
