use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub mod aws;
pub mod processor;

use crate::extractors::MediaDownloader;
use crate::resolver::VideoId;
use crate::transcript::TranscriptSegment;

/// Why the audio fallback could not produce a transcript
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AsrError {
    #[error("Speech recognition is not configured")]
    NotConfigured,

    #[error("Audio download failed: {0}")]
    DownloadFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),
}

impl AsrError {
    pub fn code(&self) -> &'static str {
        match self {
            AsrError::NotConfigured => "not_configured",
            AsrError::DownloadFailed(_) => "download_failed",
            AsrError::TranscriptionFailed(_) => "transcription_failed",
        }
    }
}

/// Segment as reported by a speech recognizer
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSegment {
    pub start: f64,
    pub duration: Option<f64>,
    pub text: String,
}

/// Speech recognition collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether credentials and settings needed to transcribe are present
    fn is_configured(&self) -> bool;

    /// Transcribe an audio file into timed segments
    async fn transcribe(&self, audio_path: &Path) -> crate::Result<Vec<RecognizedSegment>>;
}

/// ASR fallback source adapter: scoped scratch space, bounded download and transcription
#[derive(Clone)]
pub struct AsrFallback {
    downloader: Arc<dyn MediaDownloader>,
    recognizer: Arc<dyn SpeechRecognizer>,
    temp_root: Option<PathBuf>,
    download_timeout: Duration,
    transcribe_timeout: Duration,
}

impl AsrFallback {
    pub fn new(
        downloader: Arc<dyn MediaDownloader>,
        recognizer: Arc<dyn SpeechRecognizer>,
        download_timeout: Duration,
        transcribe_timeout: Duration,
    ) -> Self {
        Self {
            downloader,
            recognizer,
            temp_root: None,
            download_timeout,
            transcribe_timeout,
        }
    }

    /// Create scratch directories under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.recognizer.is_configured()
    }

    /// Download the audio of `reference` and transcribe it.
    ///
    /// The scratch directory is owned by this call and removed when it returns,
    /// fails, panics or is cancelled.
    pub async fn fetch_via_audio(
        &self,
        reference: &str,
        id: &VideoId,
    ) -> Result<Vec<TranscriptSegment>, AsrError> {
        if !self.recognizer.is_configured() {
            return Err(AsrError::NotConfigured);
        }

        let scratch = self.scratch_dir()?;
        tracing::debug!("Scratch directory for {}: {}", id, scratch.path().display());

        let audio_path = tokio::time::timeout(
            self.download_timeout,
            self.downloader.fetch_audio(reference, scratch.path()),
        )
        .await
        .map_err(|_| AsrError::DownloadFailed("download timed out".to_string()))?
        .map_err(|e| AsrError::DownloadFailed(format!("{:#}", e)))?;

        tracing::info!("Transcribing downloaded audio for {}", id);

        let recognized = tokio::time::timeout(
            self.transcribe_timeout,
            self.recognizer.transcribe(&audio_path),
        )
        .await
        .map_err(|_| AsrError::TranscriptionFailed("transcription timed out".to_string()))?
        .map_err(|e| AsrError::TranscriptionFailed(format!("{:#}", e)))?;

        drop(scratch);

        Ok(recognized
            .into_iter()
            .filter_map(|segment| {
                TranscriptSegment::normalized(segment.start, segment.duration, &segment.text)
            })
            .collect())
    }

    fn scratch_dir(&self) -> Result<TempDir, AsrError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ytscribe-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };

        dir.map_err(|e| AsrError::DownloadFailed(format!("failed to create scratch directory: {}", e)))
    }
}
