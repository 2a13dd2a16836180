//! Genre keyword vocabulary
//!
//! One shared table maps text keywords to canonical genre names.
//! Matching is always longest-keyword-first so "deep house" wins over
//! "house", and word-boundary checked so "rap" never fires inside
//! "grape". Hashtag matching uses compact forms ("deephouse").

use std::sync::OnceLock;

/// Keyword -> canonical genre. Subgenres and aliases first; the
/// matcher re-sorts by length so ordering here is for readability.
const KEYWORDS: &[(&str, &str)] = &[
    ("tribal afro house", "Afro House"),
    ("tribal house", "Tribal House"),
    ("afro house", "Afro House"),
    ("progressive house", "Progressive House"),
    ("deep house", "Deep House"),
    ("tech house", "Tech House"),
    ("electro house", "Electro House"),
    ("future bass", "Future Bass"),
    ("bass house", "Bass House"),
    ("melodic house", "Melodic House"),
    ("big room", "Big Room"),
    ("drum and bass", "Drum & Bass"),
    ("drum & bass", "Drum & Bass"),
    ("progressive trance", "Progressive Trance"),
    ("hard trance", "Hard Trance"),
    ("uplifting trance", "Uplifting Trance"),
    ("vocal trance", "Vocal Trance"),
    ("hip hop", "Hip Hop"),
    ("trap music", "Trap"),
    ("psytrance", "Psytrance"),
    ("hardstyle", "Hardstyle"),
    ("hardcore", "Hardcore"),
    ("minimal techno", "Minimal Techno"),
    ("lo-fi", "Lo-Fi"),
    ("synthwave", "Synthwave"),
    ("vaporwave", "Vaporwave"),
    ("future house", "Future House"),
    ("bassline", "Bassline"),
    ("garage", "UK Garage"),
    ("uk garage", "UK Garage"),
    ("jungle", "Jungle"),
    ("dub techno", "Dub Techno"),
    ("acid house", "Acid House"),
    ("french house", "French House"),
    ("ghetto house", "Ghetto House"),
    ("baltimore club", "Baltimore Club"),
    ("ghetto tech", "Ghetto Tech"),
    ("footwork", "Footwork"),
    ("juke", "Juke"),
    ("gqom", "Gqom"),
    ("amapiano", "Amapiano"),
    ("afrobeat", "Afrobeat"),
    ("afro tech", "Afro Tech"),
    ("afro", "Afro House"),
    ("tribal", "Tribal House"),
    ("house", "House"),
    ("techno", "Techno"),
    ("trance", "Trance"),
    ("dubstep", "Dubstep"),
    ("dnb", "Drum & Bass"),
    ("edm", "EDM"),
    ("rap", "Rap"),
    ("reggaeton", "Reggaeton"),
    ("latin", "Latin"),
    ("salsa", "Salsa"),
    ("bachata", "Bachata"),
    ("progressive", "Progressive House"),
    ("deep", "Deep House"),
    ("tech", "Tech House"),
    ("electro", "Electro"),
    ("trap", "Trap"),
    ("melodic", "Melodic House"),
    ("minimal", "Minimal"),
    ("ambient", "Ambient"),
    ("downtempo", "Downtempo"),
    ("chillout", "Chillout"),
    ("funk", "Funk"),
    ("disco", "Disco"),
    ("r&b", "R&B"),
    ("pop", "Pop"),
    ("rock", "Rock"),
    ("metal", "Metal"),
    ("jazz", "Jazz"),
    ("blues", "Blues"),
    ("reggae", "Reggae"),
];

/// Channel-name keywords: a smaller, high-precision subset matched as
/// plain substrings since channel names run words together freely.
const CHANNEL_KEYWORDS: &[(&str, &str)] = &[
    ("drum and bass", "Drum & Bass"),
    ("reggaeton", "Reggaeton"),
    ("hardstyle", "Hardstyle"),
    ("hardcore", "Hardcore"),
    ("dubstep", "Dubstep"),
    ("hip hop", "Hip Hop"),
    ("bachata", "Bachata"),
    ("trance", "Trance"),
    ("techno", "Techno"),
    ("house", "House"),
    ("salsa", "Salsa"),
    ("latin", "Latin"),
    ("dnb", "Drum & Bass"),
    ("edm", "EDM"),
    ("rap", "Rap"),
];

pub struct GenreVocabulary {
    /// (lowercase keyword, canonical), sorted longest keyword first
    keywords: Vec<(&'static str, &'static str)>,
    /// Compact hashtag forms of the same table, longest first
    compact: Vec<(String, &'static str)>,
    channel: Vec<(&'static str, &'static str)>,
}

impl GenreVocabulary {
    /// Shared built-in vocabulary.
    pub fn builtin() -> &'static GenreVocabulary {
        static VOCAB: OnceLock<GenreVocabulary> = OnceLock::new();
        VOCAB.get_or_init(|| {
            let mut keywords: Vec<_> = KEYWORDS.to_vec();
            keywords.sort_by_key(|(kw, _)| std::cmp::Reverse(kw.len()));

            let mut compact: Vec<(String, &'static str)> = KEYWORDS
                .iter()
                .map(|(kw, genre)| (kw.replace([' ', '-'], ""), *genre))
                .collect();
            compact.sort_by_key(|(kw, _)| std::cmp::Reverse(kw.len()));
            compact.dedup_by(|a, b| a.0 == b.0);

            let mut channel: Vec<_> = CHANNEL_KEYWORDS.to_vec();
            channel.sort_by_key(|(kw, _)| std::cmp::Reverse(kw.len()));

            GenreVocabulary {
                keywords,
                compact,
                channel,
            }
        })
    }

    /// Longest keyword appearing as a whole word in `text`.
    pub fn match_text(&self, text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|(kw, _)| contains_word(&lower, kw))
            .map(|(_, genre)| *genre)
    }

    /// Match compact hashtag forms, with or without the `#`.
    pub fn match_hashtags(&self, text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        self.compact
            .iter()
            .find(|(kw, _)| {
                lower.contains(&format!("#{kw}")) || contains_word(&lower, kw)
            })
            .map(|(_, genre)| *genre)
    }

    /// Channel-name matching: plain substrings, longest first.
    pub fn match_channel(&self, text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        self.channel
            .iter()
            .find(|(kw, _)| lower.contains(kw))
            .map(|(_, genre)| *genre)
    }
}

/// Whole-word containment: the match may not have an ASCII
/// alphanumeric immediately before or after it.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let ix = start + pos;
        let end = ix + needle.len();
        let before_ok = ix == 0 || !bytes[ix - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        start = ix + 1;
    }
    false
}
