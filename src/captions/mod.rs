use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod youtube;

use crate::resolver::VideoId;
use crate::transcript::TranscriptSegment;

/// Why captions could not be produced for a video
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptionsError {
    #[error("Captions are disabled for this video")]
    Disabled,

    #[error("No caption track for languages: {}", .0.join(", "))]
    NoTrackForLanguages(Vec<String>),

    #[error("Caption retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("Video is unavailable: {0}")]
    Unavailable(String),
}

impl CaptionsError {
    pub fn code(&self) -> &'static str {
        match self {
            CaptionsError::Disabled => "disabled",
            CaptionsError::NoTrackForLanguages(_) => "no_track_for_languages",
            CaptionsError::RetrievalFailed(_) => "retrieval_failed",
            CaptionsError::Unavailable(_) => "unavailable",
        }
    }
}

/// One caption track advertised by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    /// BCP-47 style language tag, e.g. `en` or `pt-BR`
    pub language_code: String,

    /// Display name of the track
    pub name: String,

    /// Automatically generated (speech recognition) rather than authored
    pub generated: bool,

    /// Provider specific location of the track contents
    pub base_url: String,
}

/// Caption entry exactly as the provider returned it
#[derive(Debug, Clone, PartialEq)]
pub struct RawCaption {
    pub start: f64,
    pub duration: f64,
    pub text: String,
}

/// Captions provider collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionsProvider: Send + Sync {
    /// List the caption tracks available for a video
    async fn list_tracks(&self, id: &VideoId) -> Result<Vec<CaptionTrack>, CaptionsError>;

    /// Retrieve the entries of one track
    async fn fetch_track(&self, track: &CaptionTrack) -> crate::Result<Vec<RawCaption>>;
}

/// Pick a track for the first language that has one, preferring authored tracks.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    languages.iter().find_map(|language| {
        let in_language = |track: &&CaptionTrack| track.language_code.eq_ignore_ascii_case(language);

        tracks
            .iter()
            .filter(in_language)
            .find(|track| !track.generated)
            .or_else(|| tracks.iter().filter(in_language).find(|track| track.generated))
    })
}

/// Captions source adapter: track selection, bounded provider calls and normalization
#[derive(Clone)]
pub struct CaptionsSource {
    provider: Arc<dyn CaptionsProvider>,
    timeout: Duration,
}

impl CaptionsSource {
    pub fn new(provider: Arc<dyn CaptionsProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Fetch normalized caption segments for `id` in the first available preferred language
    pub async fn fetch_captions(
        &self,
        id: &VideoId,
        preferred_languages: &[String],
    ) -> Result<Vec<TranscriptSegment>, CaptionsError> {
        let tracks = tokio::time::timeout(self.timeout, self.provider.list_tracks(id))
            .await
            .map_err(|_| CaptionsError::RetrievalFailed("listing tracks timed out".to_string()))??;

        tracing::debug!("Video {} has {} caption tracks", id, tracks.len());

        let track = select_track(&tracks, preferred_languages)
            .ok_or_else(|| CaptionsError::NoTrackForLanguages(preferred_languages.to_vec()))?;

        tracing::info!(
            "Using {} caption track '{}' ({}) for {}",
            if track.generated { "generated" } else { "manual" },
            track.name,
            track.language_code,
            id
        );

        let raw = tokio::time::timeout(self.timeout, self.provider.fetch_track(track))
            .await
            .map_err(|_| CaptionsError::RetrievalFailed("track download timed out".to_string()))?
            .map_err(|e| CaptionsError::RetrievalFailed(format!("{:#}", e)))?;

        Ok(raw
            .into_iter()
            .filter_map(|caption| {
                TranscriptSegment::normalized(caption.start, Some(caption.duration), &caption.text)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::always;

    fn track(language: &str, generated: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: language.to_string(),
            name: format!("{} track", language),
            generated,
            base_url: format!("https://captions.test/{}/{}", language, generated),
        }
    }

    fn langs(list: &[&str]) -> Vec<String> {
        list.iter().map(|l| l.to_string()).collect()
    }

    fn id() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_select_prefers_manual_in_same_language() {
        let tracks = vec![track("en", true), track("en", false)];
        let selected = select_track(&tracks, &langs(&["en"])).unwrap();
        assert!(!selected.generated);
    }

    #[test]
    fn test_select_language_order_beats_manual() {
        // generated track in the first language wins over a manual one in the second
        let tracks = vec![track("de", false), track("en", true)];
        let selected = select_track(&tracks, &langs(&["en", "de"])).unwrap();
        assert_eq!(selected.language_code, "en");
        assert!(selected.generated);
    }

    #[test]
    fn test_select_falls_through_languages() {
        let tracks = vec![track("fr", false)];
        assert_eq!(
            select_track(&tracks, &langs(&["en", "FR"])).unwrap().language_code,
            "fr"
        );
        assert!(select_track(&tracks, &langs(&["en", "de"])).is_none());
        assert!(select_track(&[], &langs(&["en"])).is_none());
    }

    #[tokio::test]
    async fn test_fetch_normalizes_segments() {
        let mut provider = MockCaptionsProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Ok(vec![track("en", false)]));
        provider.expect_fetch_track().times(1).returning(|_| {
            Ok(vec![
                RawCaption { start: 0.0, duration: 1.5, text: "Hello\nthere".to_string() },
                RawCaption { start: 1.5, duration: 1.0, text: " \n ".to_string() },
                RawCaption { start: 2.5, duration: 2.0, text: "  world  ".to_string() },
            ])
        });

        let source = CaptionsSource::new(Arc::new(provider), Duration::from_secs(5));
        let segments = source.fetch_captions(&id(), &langs(&["en"])).await.unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello there");
        assert_eq!(segments[0].duration, 1.5);
        assert_eq!(segments[1].text, "world");
        assert_eq!(segments[1].start, 2.5);
    }

    #[tokio::test]
    async fn test_no_matching_track() {
        let mut provider = MockCaptionsProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Ok(vec![track("ja", true)]));
        provider.expect_fetch_track().times(0);

        let source = CaptionsSource::new(Arc::new(provider), Duration::from_secs(5));
        let err = source.fetch_captions(&id(), &langs(&["en"])).await.unwrap_err();
        assert_eq!(err.code(), "no_track_for_languages");
    }

    #[tokio::test]
    async fn test_track_fetch_failure_is_retrieval_failed() {
        let mut provider = MockCaptionsProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Ok(vec![track("en", true)]));
        provider
            .expect_fetch_track()
            .with(always())
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let source = CaptionsSource::new(Arc::new(provider), Duration::from_secs(5));
        let err = source.fetch_captions(&id(), &langs(&["en"])).await.unwrap_err();
        assert_eq!(err.code(), "retrieval_failed");
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_listing_errors_pass_through() {
        for error in [
            CaptionsError::Disabled,
            CaptionsError::Unavailable("private".to_string()),
        ] {
            let expected = error.code();
            let mut provider = MockCaptionsProvider::new();
            provider
                .expect_list_tracks()
                .returning(move |_| Err(error.clone()));

            let source = CaptionsSource::new(Arc::new(provider), Duration::from_secs(5));
            let err = source.fetch_captions(&id(), &langs(&["en"])).await.unwrap_err();
            assert_eq!(err.code(), expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        struct Stalled;

        #[async_trait]
        impl CaptionsProvider for Stalled {
            async fn list_tracks(&self, _id: &VideoId) -> Result<Vec<CaptionTrack>, CaptionsError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(vec![])
            }

            async fn fetch_track(&self, _track: &CaptionTrack) -> crate::Result<Vec<RawCaption>> {
                Ok(vec![])
            }
        }

        let source = CaptionsSource::new(Arc::new(Stalled), Duration::from_secs(1));
        let err = source.fetch_captions(&id(), &langs(&["en"])).await.unwrap_err();
        assert_eq!(err.code(), "retrieval_failed");
    }
}
