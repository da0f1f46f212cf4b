use std::sync::Arc;

use crate::captions::youtube::YoutubeCaptionsClient;
use crate::captions::{CaptionsError, CaptionsSource};
use crate::config::Config;
use crate::extractors::youtube::YtDlpDownloader;
use crate::output::format_segments;
use crate::resolver::{resolve, VideoId};
use crate::transcribe::aws::AwsTranscribeRecognizer;
use crate::transcribe::{AsrError, AsrFallback};
use crate::transcript::{TranscriptResult, TranscriptSegment, TranscriptSource};

/// Terminal failure of a pipeline run
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Invalid video reference")]
    InvalidReference,

    #[error("Video {video_id} is unavailable: {detail}")]
    VideoUnavailable { video_id: VideoId, detail: String },

    #[error("No transcript available for {video_id}: {detail}")]
    NoTranscriptAvailable { video_id: VideoId, detail: String },

    #[error("Internal error: {detail}")]
    Internal { video_id: Option<VideoId>, detail: String },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidReference => "invalid_reference",
            PipelineError::VideoUnavailable { .. } => "video_unavailable",
            PipelineError::NoTranscriptAvailable { .. } => "no_transcript_available",
            PipelineError::Internal { .. } => "internal",
        }
    }

    pub fn video_id(&self) -> Option<&VideoId> {
        match self {
            PipelineError::InvalidReference => None,
            PipelineError::VideoUnavailable { video_id, .. }
            | PipelineError::NoTranscriptAvailable { video_id, .. } => Some(video_id),
            PipelineError::Internal { video_id, .. } => video_id.as_ref(),
        }
    }
}

/// Where a captions failure sends the pipeline next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionsRoute {
    /// No usable captions; try the audio fallback
    Fallback,
    /// The video itself is inaccessible; stop
    Terminal,
}

/// Route a captions failure
pub fn route_captions_failure(error: &CaptionsError) -> CaptionsRoute {
    match error {
        CaptionsError::Disabled
        | CaptionsError::NoTrackForLanguages(_)
        | CaptionsError::RetrievalFailed(_) => CaptionsRoute::Fallback,
        CaptionsError::Unavailable(_) => CaptionsRoute::Terminal,
    }
}

/// Pipeline states, visited in order
#[derive(Debug)]
enum Stage {
    Resolving,
    CaptionsAttempt(VideoId),
    AsrAttempt(VideoId),
    Formatting {
        video_id: VideoId,
        source: TranscriptSource,
        segments: Vec<TranscriptSegment>,
    },
}

/// Outcome of advancing one stage
enum Step {
    Next(Stage),
    Done(Result<TranscriptResult, PipelineError>),
}

/// Fallback orchestration pipeline: resolve, captions, audio fallback, format
#[derive(Clone)]
pub struct TranscriptPipeline {
    captions: CaptionsSource,
    asr: AsrFallback,
    languages: Arc<Vec<String>>,
}

impl TranscriptPipeline {
    pub fn new(captions: CaptionsSource, asr: AsrFallback, languages: Vec<String>) -> Self {
        Self {
            captions,
            asr,
            languages: Arc::new(languages),
        }
    }

    /// Wire the YouTube captions client, yt-dlp and AWS Transcribe from configuration
    pub async fn from_config(config: &Config) -> crate::Result<Self> {
        let provider = YoutubeCaptionsClient::new(config.captions_timeout())?;
        let captions = CaptionsSource::new(Arc::new(provider), config.captions_timeout());

        let downloader = YtDlpDownloader::new(&config.download);
        let recognizer = AwsTranscribeRecognizer::new(config.asr.clone()).await?;
        let asr = AsrFallback::new(
            Arc::new(downloader),
            Arc::new(recognizer),
            config.download_timeout(),
            config.asr_timeout(),
        )
        .with_temp_root(config.download.temp_dir.clone());

        if !asr.is_configured() {
            tracing::info!("Running captions only; audio fallback requests will fail fast");
        }

        Ok(Self::new(captions, asr, config.captions.languages.clone()))
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Run the pipeline with the configured language preference
    pub async fn run(&self, reference: &str) -> Result<TranscriptResult, PipelineError> {
        self.run_with_languages(reference, &self.languages).await
    }

    /// Run the pipeline with an explicit language preference
    pub async fn run_with_languages(
        &self,
        reference: &str,
        languages: &[String],
    ) -> Result<TranscriptResult, PipelineError> {
        let mut stage = Stage::Resolving;

        loop {
            match self.advance(stage, reference, languages).await {
                Step::Next(next) => stage = next,
                Step::Done(outcome) => return outcome,
            }
        }
    }

    /// Run on a dedicated task so a panic in a collaborator becomes an `Internal` error
    pub async fn run_in_task(self: Arc<Self>, reference: String) -> Result<TranscriptResult, PipelineError> {
        let task = tokio::spawn(async move { self.run(&reference).await });

        match task.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                tracing::error!("Pipeline task failed: {}", join_error);
                Err(PipelineError::Internal {
                    video_id: None,
                    detail: join_error.to_string(),
                })
            }
        }
    }

    async fn advance(&self, stage: Stage, reference: &str, languages: &[String]) -> Step {
        match stage {
            Stage::Resolving => match resolve(reference) {
                Ok(video_id) => {
                    tracing::info!("Resolved {} to {}", reference.trim(), video_id);
                    Step::Next(Stage::CaptionsAttempt(video_id))
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    Step::Done(Err(PipelineError::InvalidReference))
                }
            },

            Stage::CaptionsAttempt(video_id) => {
                match self.captions.fetch_captions(&video_id, languages).await {
                    Ok(segments) if !segments.is_empty() => Step::Next(Stage::Formatting {
                        video_id,
                        source: TranscriptSource::Captions,
                        segments,
                    }),
                    Ok(_) => {
                        tracing::warn!("Captions for {} contained no text, trying audio", video_id);
                        Step::Next(Stage::AsrAttempt(video_id))
                    }
                    Err(e) => match route_captions_failure(&e) {
                        CaptionsRoute::Fallback => {
                            tracing::warn!("{} for {} ({}), trying audio", e, video_id, e.code());
                            Step::Next(Stage::AsrAttempt(video_id))
                        }
                        CaptionsRoute::Terminal => {
                            tracing::warn!("{}", e);
                            let detail = e.to_string();
                            Step::Done(Err(PipelineError::VideoUnavailable { video_id, detail }))
                        }
                    },
                }
            }

            Stage::AsrAttempt(video_id) => {
                // the downloader only ever sees the canonical watch URL
                let watch_url = video_id.watch_url();
                match self.asr.fetch_via_audio(&watch_url, &video_id).await {
                    Ok(segments) if !segments.is_empty() => Step::Next(Stage::Formatting {
                        video_id,
                        source: TranscriptSource::AsrFallback,
                        segments,
                    }),
                    Ok(_) => Step::Done(Err(PipelineError::NoTranscriptAvailable {
                        video_id,
                        detail: "empty_transcript".to_string(),
                    })),
                    Err(e) => {
                        log_asr_failure(&video_id, &e);
                        Step::Done(Err(PipelineError::NoTranscriptAvailable {
                            video_id,
                            detail: e.code().to_string(),
                        }))
                    }
                }
            }

            Stage::Formatting { video_id, source, segments } => {
                tracing::info!("Formatted {} {} segments for {}", segments.len(), source, video_id);
                Step::Done(Ok(TranscriptResult {
                    identifier: video_id,
                    reference: reference.to_string(),
                    formatted_text: format_segments(&segments),
                    segments,
                    source,
                }))
            }
        }
    }
}

fn log_asr_failure(video_id: &VideoId, error: &AsrError) {
    match error {
        AsrError::NotConfigured => {
            tracing::info!("No captions for {} and audio fallback is not configured", video_id)
        }
        _ => tracing::warn!("Audio fallback failed for {}: {}", video_id, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::{CaptionTrack, CaptionsProvider, MockCaptionsProvider, RawCaption};
    use crate::extractors::MockMediaDownloader;
    use crate::transcribe::{MockSpeechRecognizer, RecognizedSegment};
    use std::time::Duration;

    const URL: &str = "https://youtu.be/dQw4w9WgXcQ";

    fn english_track() -> CaptionTrack {
        CaptionTrack {
            language_code: "en".to_string(),
            name: "English".to_string(),
            generated: false,
            base_url: "https://captions.test/en".to_string(),
        }
    }

    fn captions_failing(error: CaptionsError) -> MockCaptionsProvider {
        let mut provider = MockCaptionsProvider::new();
        provider
            .expect_list_tracks()
            .returning(move |_| Err(error.clone()));
        provider
    }

    fn captions_returning(captions: Vec<RawCaption>) -> MockCaptionsProvider {
        let mut provider = MockCaptionsProvider::new();
        provider
            .expect_list_tracks()
            .returning(|_| Ok(vec![english_track()]));
        provider
            .expect_fetch_track()
            .returning(move |_| Ok(captions.clone()));
        provider
    }

    fn downloader_ok() -> MockMediaDownloader {
        let mut downloader = MockMediaDownloader::new();
        downloader.expect_fetch_audio().returning(|_, dir| {
            let path = dir.join("audio.mp3");
            fs_err::write(&path, b"audio")?;
            Ok(path)
        });
        downloader
    }

    fn downloader_never_called() -> MockMediaDownloader {
        let mut downloader = MockMediaDownloader::new();
        downloader.expect_fetch_audio().times(0);
        downloader
    }

    fn recognizer_returning(segments: Vec<RecognizedSegment>) -> MockSpeechRecognizer {
        let mut recognizer = MockSpeechRecognizer::new();
        recognizer.expect_is_configured().return_const(true);
        recognizer
            .expect_transcribe()
            .times(1)
            .returning(move |_| Ok(segments.clone()));
        recognizer
    }

    fn recognizer_never_called() -> MockSpeechRecognizer {
        let mut recognizer = MockSpeechRecognizer::new();
        recognizer.expect_is_configured().return_const(true);
        recognizer.expect_transcribe().times(0);
        recognizer
    }

    fn pipeline(
        provider: impl CaptionsProvider + 'static,
        downloader: MockMediaDownloader,
        recognizer: MockSpeechRecognizer,
    ) -> TranscriptPipeline {
        let captions = CaptionsSource::new(Arc::new(provider), Duration::from_secs(5));
        let asr = AsrFallback::new(
            Arc::new(downloader),
            Arc::new(recognizer),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        TranscriptPipeline::new(captions, asr, vec!["en".to_string()])
    }

    fn asr_segment(start: f64, text: &str) -> RecognizedSegment {
        RecognizedSegment { start, duration: None, text: text.to_string() }
    }

    #[test]
    fn test_captions_failure_routing() {
        assert_eq!(route_captions_failure(&CaptionsError::Disabled), CaptionsRoute::Fallback);
        assert_eq!(
            route_captions_failure(&CaptionsError::NoTrackForLanguages(vec!["en".to_string()])),
            CaptionsRoute::Fallback
        );
        assert_eq!(
            route_captions_failure(&CaptionsError::RetrievalFailed("503".to_string())),
            CaptionsRoute::Fallback
        );
        assert_eq!(
            route_captions_failure(&CaptionsError::Unavailable("private".to_string())),
            CaptionsRoute::Terminal
        );
    }

    #[tokio::test]
    async fn test_captions_success_skips_asr() {
        let provider = captions_returning(vec![
            RawCaption { start: 0.0, duration: 2.0, text: "Hello".to_string() },
            RawCaption { start: 65.0, duration: 2.0, text: "World".to_string() },
        ]);
        let pipeline = pipeline(provider, downloader_never_called(), recognizer_never_called());

        let result = pipeline.run(URL).await.unwrap();
        assert_eq!(result.source, TranscriptSource::Captions);
        assert_eq!(result.identifier.as_str(), "dQw4w9WgXcQ");
        assert_eq!(result.reference, URL);
        assert_eq!(result.formatted_text, "00:00:00\nHello\n\n00:01:05\nWorld");
    }

    #[tokio::test]
    async fn test_disabled_captions_fall_back_to_asr() {
        let pipeline = pipeline(
            captions_failing(CaptionsError::Disabled),
            downloader_ok(),
            recognizer_returning(vec![asr_segment(3.7, "from audio")]),
        );

        let result = pipeline.run(URL).await.unwrap();
        assert_eq!(result.source, TranscriptSource::AsrFallback);
        assert_eq!(result.segments[0].duration, 0.0);
        assert_eq!(result.formatted_text, "00:00:03\nfrom audio");
    }

    #[tokio::test]
    async fn test_retrieval_failure_falls_back_to_asr() {
        let pipeline = pipeline(
            captions_failing(CaptionsError::RetrievalFailed("timeout".to_string())),
            downloader_ok(),
            recognizer_returning(vec![asr_segment(0.0, "text")]),
        );

        assert_eq!(pipeline.run(URL).await.unwrap().source, TranscriptSource::AsrFallback);
    }

    #[tokio::test]
    async fn test_unavailable_video_never_attempts_asr() {
        let pipeline = pipeline(
            captions_failing(CaptionsError::Unavailable("Video unavailable".to_string())),
            downloader_never_called(),
            recognizer_never_called(),
        );

        let err = pipeline.run(URL).await.unwrap_err();
        assert_eq!(err.code(), "video_unavailable");
        assert_eq!(err.video_id().unwrap().as_str(), "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn test_unconfigured_asr_fails_without_download() {
        let mut recognizer = MockSpeechRecognizer::new();
        recognizer.expect_is_configured().return_const(false);
        recognizer.expect_transcribe().times(0);

        let pipeline = pipeline(
            captions_failing(CaptionsError::NoTrackForLanguages(vec!["en".to_string()])),
            downloader_never_called(),
            recognizer,
        );

        let err = pipeline.run(URL).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::NoTranscriptAvailable {
                video_id: VideoId::parse("dQw4w9WgXcQ").unwrap(),
                detail: "not_configured".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_asr_failure_detail_is_failure_kind() {
        let mut recognizer = MockSpeechRecognizer::new();
        recognizer.expect_is_configured().return_const(true);
        recognizer
            .expect_transcribe()
            .returning(|_| Err(anyhow::anyhow!("quota exceeded")));

        let pipeline = pipeline(captions_failing(CaptionsError::Disabled), downloader_ok(), recognizer);

        match pipeline.run(URL).await.unwrap_err() {
            PipelineError::NoTranscriptAvailable { detail, .. } => {
                assert_eq!(detail, "transcription_failed")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_captions_fall_back_and_empty_asr_fails() {
        let provider = captions_returning(vec![RawCaption {
            start: 0.0,
            duration: 1.0,
            text: "\n".to_string(),
        }]);
        let pipeline = pipeline(provider, downloader_ok(), recognizer_returning(vec![asr_segment(0.0, "  ")]));

        match pipeline.run(URL).await.unwrap_err() {
            PipelineError::NoTranscriptAvailable { detail, .. } => assert_eq!(detail, "empty_transcript"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_audio_is_downloaded_by_canonical_id() {
        for (reference, expected) in [
            ("-abcdefghij", "https://www.youtube.com/watch?v=-abcdefghij"),
            ("watch this: dQw4w9WgXcQ !", "https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
        ] {
            let mut downloader = MockMediaDownloader::new();
            downloader
                .expect_fetch_audio()
                .withf(move |reference, _| reference.to_string() == expected)
                .times(1)
                .returning(|_, dir| {
                    let path = dir.join("audio.mp3");
                    fs_err::write(&path, b"audio")?;
                    Ok(path)
                });

            let pipeline = pipeline(
                captions_failing(CaptionsError::Disabled),
                downloader,
                recognizer_returning(vec![asr_segment(0.0, "text")]),
            );

            let result = pipeline.run(reference).await.unwrap();
            assert_eq!(result.source, TranscriptSource::AsrFallback);
            assert_eq!(result.reference, reference);
        }
    }

    #[tokio::test]
    async fn test_invalid_reference_touches_nothing() {
        let mut provider = MockCaptionsProvider::new();
        provider.expect_list_tracks().times(0);
        let pipeline = pipeline(provider, downloader_never_called(), recognizer_never_called());

        let err = pipeline.run("not a url or id").await.unwrap_err();
        assert_eq!(err, PipelineError::InvalidReference);
        assert!(err.video_id().is_none());
    }

    #[tokio::test]
    async fn test_run_with_languages_overrides_default() {
        let mut provider = MockCaptionsProvider::new();
        provider.expect_list_tracks().returning(|_| {
            Ok(vec![CaptionTrack {
                language_code: "de".to_string(),
                ..english_track()
            }])
        });
        provider.expect_fetch_track().returning(|_| {
            Ok(vec![RawCaption { start: 1.0, duration: 1.0, text: "Hallo".to_string() }])
        });
        let pipeline = pipeline(provider, downloader_never_called(), recognizer_never_called());

        let result = pipeline
            .run_with_languages(URL, &["de".to_string()])
            .await
            .unwrap();
        assert_eq!(result.source, TranscriptSource::Captions);
    }

    #[tokio::test]
    async fn test_panic_in_task_is_internal() {
        struct Exploding;

        #[async_trait::async_trait]
        impl CaptionsProvider for Exploding {
            async fn list_tracks(&self, _id: &VideoId) -> Result<Vec<CaptionTrack>, CaptionsError> {
                panic!("provider exploded")
            }

            async fn fetch_track(&self, _track: &CaptionTrack) -> crate::Result<Vec<RawCaption>> {
                Ok(vec![])
            }
        }

        let pipeline = Arc::new(pipeline(Exploding, downloader_never_called(), recognizer_never_called()));

        let err = pipeline.run_in_task(URL.to_string()).await.unwrap_err();
        assert_eq!(err.code(), "internal");
    }
}
