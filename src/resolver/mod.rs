use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// Length of a canonical YouTube video identifier
pub const VIDEO_ID_LEN: usize = 11;

/// Hosts accepted when a reference is given without a scheme
const SCHEMELESS_HOSTS: &[&str] = &["youtu.be/", "youtube.com/", "www.youtube.com/", "m.youtube.com/", "music.youtube.com/"];

/// Path prefixes on youtube.com whose next segment is the identifier
const ID_PATH_PREFIXES: &[&str] = &["shorts", "embed", "live", "v"];

static MARKED_TOKEN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?:v=|youtu\.be/|embed/|shorts/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)")
        .expect("static regex")
});

static BARE_TOKEN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?:^|[^A-Za-z0-9_-])([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)")
        .expect("static regex")
});

/// Failure to derive a canonical identifier from a reference
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Invalid video reference: {0}")]
    InvalidReference(String),
}

impl ResolutionError {
    pub fn code(&self) -> &'static str {
        match self {
            ResolutionError::InvalidReference(_) => "invalid_reference",
        }
    }
}

/// Canonical 11-character video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Accept `candidate` only if it already has the canonical shape
    pub fn parse(candidate: &str) -> Option<Self> {
        is_canonical(candidate).then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Watch page URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_canonical(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN && candidate.chars().all(is_id_char)
}

/// Resolve an arbitrary video reference to its canonical identifier.
///
/// Rules are tried in priority order: a bare identifier, a `youtu.be` link, a
/// `youtube.com` link (`/watch?v=`, `/shorts/`, `/embed/`, `/live/`, `/v/`) and finally
/// a search for a standalone identifier-shaped token anywhere in the input.
pub fn resolve(reference: &str) -> Result<VideoId, ResolutionError> {
    let trimmed = reference.trim();

    if let Some(id) = VideoId::parse(trimmed) {
        return Ok(id);
    }

    if let Some(id) = parse_reference_url(trimmed).and_then(|url| id_from_url(&url)) {
        return Ok(id);
    }

    if let Some(id) = search_token(trimmed) {
        tracing::debug!("Resolved {} by token search", id);
        return Ok(id);
    }

    Err(ResolutionError::InvalidReference(trimmed.to_string()))
}

fn parse_reference_url(reference: &str) -> Option<Url> {
    match Url::parse(reference) {
        Ok(url) if url.host_str().is_some() => Some(url),
        _ => {
            let lower = reference.to_ascii_lowercase();
            if SCHEMELESS_HOSTS.iter().any(|host| lower.starts_with(host)) {
                Url::parse(&format!("https://{}", reference)).ok()
            } else {
                None
            }
        }
    }
}

fn id_from_url(url: &Url) -> Option<VideoId> {
    let host = url.host_str()?.to_ascii_lowercase();

    if host.ends_with("youtu.be") {
        let first = url.path().trim_start_matches('/').split('/').next()?;
        return VideoId::parse(first);
    }

    if host.contains("youtube.com") {
        if url.path() == "/watch" || url.path() == "/watch/" {
            return url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .and_then(|(_, value)| VideoId::parse(value.trim()));
        }

        let mut segments = url.path_segments()?;
        let prefix = segments.next()?;
        if ID_PATH_PREFIXES.contains(&prefix) {
            return segments.next().and_then(VideoId::parse);
        }
    }

    None
}

fn search_token(reference: &str) -> Option<VideoId> {
    MARKED_TOKEN
        .captures(reference)
        .or_else(|| BARE_TOKEN.captures(reference))
        .and_then(|caps| caps.get(1))
        .and_then(|m| VideoId::parse(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    fn resolved(reference: &str) -> String {
        resolve(reference).unwrap().to_string()
    }

    #[test]
    fn test_bare_id_is_identity() {
        for id in [ID, "abc-DEF_123", "___________", "-----------", "0123456789a"] {
            assert_eq!(resolved(id), id);
        }
        assert_eq!(resolved("  dQw4w9WgXcQ\n"), ID);
    }

    #[test]
    fn test_known_url_shapes() {
        let shapes = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abcdef",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?start=10",
            "https://WWW.YOUTUBE.COM/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ",
        ];
        for url in shapes {
            assert_eq!(resolved(url), ID, "failed for {}", url);
        }
    }

    #[test]
    fn test_schemeless_urls() {
        assert_eq!(resolved("youtu.be/dQw4w9WgXcQ"), ID);
        assert_eq!(resolved("www.youtube.com/watch?v=dQw4w9WgXcQ"), ID);
    }

    #[test]
    fn test_token_search_prefers_marked_token() {
        assert_eq!(
            resolved("see aaaaaaaaaaa or https://example.com/x?v=dQw4w9WgXcQ"),
            ID
        );
        assert_eq!(resolved("watch this: dQw4w9WgXcQ !"), ID);
    }

    #[test]
    fn test_invalid_references() {
        let err = resolve("not a url or id").unwrap_err();
        assert_eq!(err.code(), "invalid_reference");

        assert!(resolve("").is_err());
        assert!(resolve("https://www.youtube.com/watch?v=short").is_err());
        assert!(resolve("https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv").is_err());
        // never truncate a longer token into an identifier
        assert!(resolve("https://youtu.be/dQw4w9WgXcQextra").is_err());
        assert!(resolve("dQw4w9WgXcQ1").is_err());
    }

    #[test]
    fn test_video_id_parse() {
        assert!(VideoId::parse(ID).is_some());
        assert!(VideoId::parse("dQw4w9WgXc?").is_none());
        assert!(VideoId::parse("dQw4w9WgXc/").is_none());
        assert_eq!(
            VideoId::parse(ID).unwrap().watch_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
