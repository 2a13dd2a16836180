//! Media reference identity and locator normalization
//!
//! A reference pairs a stable external video identifier with a canonical
//! watch URL. All deduplication keys off the identifier, so playlist
//! URLs, short links, and share links with tracking parameters must all
//! collapse to the same reference.

use serde::{Deserialize, Serialize};
use tunedeck_common::{Error, Result};
use url::Url;

/// A single remote media item: stable identifier plus canonical locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Provider-scoped video identifier (e.g. the 11-char YouTube id)
    pub video_id: String,
    /// Canonical watch URL, stripped of playlist/tracking parameters
    pub url: Url,
}

impl MediaReference {
    /// Build a reference from an explicit id, synthesizing the canonical URL.
    pub fn from_video_id(video_id: &str) -> Result<Self> {
        if video_id.is_empty() {
            return Err(Error::InvalidInput("empty video id".to_string()));
        }
        let url = Url::parse(&format!("https://www.youtube.com/watch?v={video_id}"))
            .map_err(|e| Error::InvalidInput(format!("invalid video id {video_id:?}: {e}")))?;
        Ok(Self {
            video_id: video_id.to_string(),
            url,
        })
    }

    /// Build a reference by parsing and canonicalizing a user-supplied URL.
    ///
    /// Accepts `youtube.com/watch?v=`, `youtu.be/<id>`, and
    /// `youtube.com/shorts/<id>` forms. Extra query parameters
    /// (`&list=`, `&t=`, tracking junk) are dropped.
    pub fn from_url(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| Error::InvalidInput(format!("invalid URL {raw:?}: {e}")))?;
        let video_id = video_id_from_url(&url)
            .ok_or_else(|| Error::InvalidInput(format!("no video id in URL {raw:?}")))?;
        Self::from_video_id(&video_id)
    }

    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Extract the video id from a watch/short/shorts URL.
pub fn video_id_from_url(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    if host.ends_with("youtu.be") {
        let id = url.path().trim_matches('/');
        return if id.is_empty() { None } else { Some(id.to_string()) };
    }
    if host.ends_with("youtube.com") {
        if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
            if !v.is_empty() {
                return Some(v.into_owned());
            }
        }
        // /shorts/<id> and /embed/<id> forms carry the id in the path
        let mut segments = url.path_segments()?;
        if let Some(first) = segments.next() {
            if first == "shorts" || first == "embed" {
                if let Some(id) = segments.next() {
                    if !id.is_empty() {
                        return Some(id.to_string());
                    }
                }
            }
        }
    }
    None
}

/// Strip filesystem-hostile characters and collapse whitespace.
/// Result is capped at 200 characters.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(200).collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_watch_url_with_extra_params() {
        let r =
            MediaReference::from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL0&t=30s")
                .unwrap();
        assert_eq!(r.video_id, "dQw4w9WgXcQ");
        assert_eq!(r.url_str(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn canonicalizes_short_link() {
        let r = MediaReference::from_url("https://youtu.be/dQw4w9WgXcQ?si=xyz").unwrap();
        assert_eq!(r.video_id, "dQw4w9WgXcQ");
        assert_eq!(r.url_str(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn canonicalizes_shorts_url() {
        let r = MediaReference::from_url("https://www.youtube.com/shorts/abc123DEF45").unwrap();
        assert_eq!(r.video_id, "abc123DEF45");
    }

    #[test]
    fn rejects_url_without_id() {
        assert!(MediaReference::from_url("https://www.youtube.com/feed/library").is_err());
        assert!(MediaReference::from_url("not a url").is_err());
    }

    #[test]
    fn same_reference_from_all_forms() {
        let a = MediaReference::from_url("https://youtu.be/dQw4w9WgXcQ").unwrap();
        let b = MediaReference::from_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=x").unwrap();
        let c = MediaReference::from_video_id("dQw4w9WgXcQ").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn sanitize_strips_hostile_chars() {
        assert_eq!(
            sanitize_filename("AC/DC - Back In Black?"),
            "ACDC - Back In Black"
        );
        assert_eq!(sanitize_filename("a   b\t\tc"), "a b c");
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).len(), 200);
    }
}
