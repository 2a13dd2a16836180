//! Resolved provider metadata and the fields derived from it

use serde::{Deserialize, Serialize};

/// Metadata as returned by the media provider for a single reference.
///
/// This is the normalized form of the provider's info JSON; only the
/// fields the pipeline consumes are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub duration_seconds: Option<f64>,
    pub release_year: Option<i32>,
    /// `YYYYMMDD` or `YYYY-MM-DD` as delivered by the provider
    pub release_date: Option<String>,
    /// Unix seconds of the official release, when known
    pub release_timestamp: Option<i64>,
    /// Upload date, `YYYYMMDD`
    pub upload_date: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Fields distilled from [`ResolvedMetadata`] for naming, tagging, and
/// classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub artist: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    /// Quick genre hit from title/description keywords, if any.
    /// Absence here does not mean unclassifiable; the full cascade runs later.
    pub genre: Option<String>,
}

/// Where a genre classification came from, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenreSource {
    History,
    Hashtag,
    Tags,
    Channel,
    TitleKeyword,
    DescriptionDeep,
    ExternalRegistry,
    WebSearch,
    AudioMl,
}

impl GenreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenreSource::History => "history",
            GenreSource::Hashtag => "hashtag",
            GenreSource::Tags => "tags",
            GenreSource::Channel => "channel",
            GenreSource::TitleKeyword => "title_keyword",
            GenreSource::DescriptionDeep => "description_deep",
            GenreSource::ExternalRegistry => "external_registry",
            GenreSource::WebSearch => "web_search",
            GenreSource::AudioMl => "audio_ml",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "history" => Some(GenreSource::History),
            "hashtag" => Some(GenreSource::Hashtag),
            "tags" => Some(GenreSource::Tags),
            "channel" => Some(GenreSource::Channel),
            "title_keyword" => Some(GenreSource::TitleKeyword),
            "description_deep" => Some(GenreSource::DescriptionDeep),
            "external_registry" => Some(GenreSource::ExternalRegistry),
            "web_search" => Some(GenreSource::WebSearch),
            "audio_ml" => Some(GenreSource::AudioMl),
            _ => None,
        }
    }
}

/// A genre classification together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreResult {
    pub genre: String,
    pub source: GenreSource,
}

/// Decade folder name for a release year: `1990s`, `2020s`, or
/// `Unknown` when no year is available.
pub fn decade_from_year(year: Option<i32>) -> String {
    match year {
        Some(y) => format!("{}s", (y / 10) * 10),
        None => "Unknown".to_string(),
    }
}

impl ExtractedFields {
    /// Derive artist, title, year, and a quick genre hit from provider
    /// metadata.
    ///
    /// Year preference order: explicit release year, release date,
    /// release timestamp, upload date, then a plausible 4-digit year in
    /// the title (which is then stripped from the title).
    pub fn derive(metadata: &ResolvedMetadata, vocab: &crate::services::genre::GenreVocabulary) -> Self {
        let mut year = year_from_provider(metadata);
        let mut title = metadata.title.clone();

        if year.is_none() {
            if let Some((found, cleaned)) = year_from_title(&title) {
                year = Some(found);
                title = cleaned;
            }
        }

        let (artist, track_title) = split_artist_title(&title);
        let artist = artist.or_else(|| artist_from_description(&metadata.description));

        let genre = vocab
            .match_text(&metadata.title)
            .or_else(|| vocab.match_text(&metadata.description))
            .map(str::to_string);

        Self {
            artist,
            title: track_title,
            year,
            genre,
        }
    }
}

fn plausible_year(y: i32) -> bool {
    (1900..=2100).contains(&y)
}

fn year_from_provider(metadata: &ResolvedMetadata) -> Option<i32> {
    if let Some(y) = metadata.release_year.filter(|y| plausible_year(*y)) {
        return Some(y);
    }
    if let Some(date) = &metadata.release_date {
        if let Some(y) = first_four_digit_year(date) {
            return Some(y);
        }
    }
    if let Some(ts) = metadata.release_timestamp {
        if let Some(dt) = chrono::DateTime::from_timestamp(ts, 0) {
            use chrono::Datelike;
            let y = dt.year();
            if plausible_year(y) {
                return Some(y);
            }
        }
    }
    if let Some(upload) = &metadata.upload_date {
        if upload.len() >= 4 {
            if let Ok(y) = upload[..4].parse::<i32>() {
                if plausible_year(y) {
                    return Some(y);
                }
            }
        }
    }
    None
}

/// First run of exactly four digits that parses to a plausible year.
fn first_four_digit_year(s: &str) -> Option<i32> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4 {
                if let Ok(y) = s[start..i].parse::<i32>() {
                    if plausible_year(y) {
                        return Some(y);
                    }
                }
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Find a standalone `19xx`/`20xx` token in a title, returning the year
/// and the title with the year (and its surrounding brackets) removed.
fn year_from_title(title: &str) -> Option<(i32, String)> {
    let bytes = title.as_bytes();
    let mut i = 0;
    while i + 4 <= bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            let mut end = i;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            let boundary_before = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
            let boundary_after = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
            if end - start == 4 && boundary_before && boundary_after {
                let token = &title[start..end];
                if token.starts_with("19") || token.starts_with("20") {
                    if let Ok(year) = token.parse::<i32>() {
                        return Some((year, strip_year_token(title, start, end)));
                    }
                }
            }
            i = end;
        } else {
            i += 1;
        }
    }
    None
}

/// Remove a year token plus any wrapping brackets/dashes and pad spaces.
fn strip_year_token(title: &str, start: usize, end: usize) -> String {
    let bytes = title.as_bytes();
    let mut s = start;
    let mut e = end;
    while s > 0 && bytes[s - 1] == b' ' {
        s -= 1;
    }
    if s > 0 && matches!(bytes[s - 1], b'(' | b'[' | b'-') {
        s -= 1;
        while s > 0 && bytes[s - 1] == b' ' {
            s -= 1;
        }
    }
    while e < bytes.len() && bytes[e] == b' ' {
        e += 1;
    }
    if e < bytes.len() && matches!(bytes[e], b')' | b']' | b'-') {
        e += 1;
        while e < bytes.len() && bytes[e] == b' ' {
            e += 1;
        }
    }
    let mut out = String::with_capacity(title.len());
    out.push_str(title[..s].trim_end());
    let tail = title[e..].trim_start();
    if !out.is_empty() && !tail.is_empty() {
        out.push(' ');
    }
    out.push_str(tail);
    out.trim().to_string()
}

/// Split `Artist - Title` on the first spaced dash (plain, en, or em).
fn split_artist_title(title: &str) -> (Option<String>, String) {
    let separators = [" - ", " \u{2013} ", " \u{2014} "];
    let first = separators
        .iter()
        .filter_map(|sep| title.find(sep).map(|ix| (ix, sep.len())))
        .min_by_key(|(ix, _)| *ix);
    match first {
        Some((ix, sep_len)) => {
            let artist = title[..ix].trim();
            let track = title[ix + sep_len..].trim();
            if artist.is_empty() || track.is_empty() {
                (None, title.trim().to_string())
            } else {
                (Some(artist.to_string()), track.to_string())
            }
        }
        None => (None, title.trim().to_string()),
    }
}

/// Look for `Artist: X` style labels in the description.
fn artist_from_description(description: &str) -> Option<String> {
    const LABELS: [&str; 6] = ["artist:", "artista:", "by:", "por:", "performer:", "intérprete:"];
    for line in description.lines() {
        let lower = line.to_lowercase();
        for label in LABELS {
            if let Some(pos) = lower.find(label) {
                let value = line[pos + label.len()..].trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::genre::GenreVocabulary;

    fn meta(title: &str) -> ResolvedMetadata {
        ResolvedMetadata {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn decade_rules() {
        assert_eq!(decade_from_year(Some(1994)), "1990s");
        assert_eq!(decade_from_year(Some(2020)), "2020s");
        assert_eq!(decade_from_year(Some(2029)), "2020s");
        assert_eq!(decade_from_year(None), "Unknown");
    }

    #[test]
    fn explicit_release_year_wins() {
        let mut m = meta("Artist - Song (1999)");
        m.release_year = Some(1987);
        m.upload_date = Some("20210101".to_string());
        let fields = ExtractedFields::derive(&m, GenreVocabulary::builtin());
        assert_eq!(fields.year, Some(1987));
    }

    #[test]
    fn upload_date_used_as_last_resort() {
        let mut m = meta("Artist - Song");
        m.upload_date = Some("20150612".to_string());
        let fields = ExtractedFields::derive(&m, GenreVocabulary::builtin());
        assert_eq!(fields.year, Some(2015));
    }

    #[test]
    fn year_extracted_and_stripped_from_title() {
        let fields = ExtractedFields::derive(&meta("Daft Punk - Around The World (1997)"), GenreVocabulary::builtin());
        assert_eq!(fields.year, Some(1997));
        assert_eq!(fields.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(fields.title, "Around The World");
    }

    #[test]
    fn embedded_digits_are_not_years() {
        let fields = ExtractedFields::derive(&meta("Blink1982 - Song"), GenreVocabulary::builtin());
        assert_eq!(fields.year, None);
        assert_eq!(fields.artist.as_deref(), Some("Blink1982"));
    }

    #[test]
    fn splits_on_en_dash() {
        let fields = ExtractedFields::derive(&meta("Orbital \u{2013} Halcyon"), GenreVocabulary::builtin());
        assert_eq!(fields.artist.as_deref(), Some("Orbital"));
        assert_eq!(fields.title, "Halcyon");
    }

    #[test]
    fn no_separator_keeps_full_title() {
        let fields = ExtractedFields::derive(&meta("Some Mix Session"), GenreVocabulary::builtin());
        assert_eq!(fields.artist, None);
        assert_eq!(fields.title, "Some Mix Session");
    }

    #[test]
    fn artist_from_description_label() {
        let mut m = meta("Untitled Track");
        m.description = "Official upload\nArtist: Aphex Twin\n".to_string();
        let fields = ExtractedFields::derive(&m, GenreVocabulary::builtin());
        assert_eq!(fields.artist.as_deref(), Some("Aphex Twin"));
    }

    #[test]
    fn genre_source_round_trip() {
        for source in [
            GenreSource::History,
            GenreSource::Hashtag,
            GenreSource::Tags,
            GenreSource::Channel,
            GenreSource::TitleKeyword,
            GenreSource::DescriptionDeep,
            GenreSource::ExternalRegistry,
            GenreSource::WebSearch,
            GenreSource::AudioMl,
        ] {
            assert_eq!(GenreSource::parse(source.as_str()), Some(source));
        }
    }
}
