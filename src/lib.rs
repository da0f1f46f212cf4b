//! ytscribe - time-coded transcripts for YouTube videos
//!
//! This library resolves a video reference to its canonical identifier, fetches the
//! provider-hosted captions when they exist and falls back to downloading the audio
//! and transcribing it with AWS Transcribe when they do not.

pub mod captions;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod server;
pub mod transcribe;
pub mod transcript;
pub mod utils;

pub use captions::{CaptionsError, CaptionsProvider, CaptionsSource};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::MediaDownloader;
pub use pipeline::{PipelineError, TranscriptPipeline};
pub use resolver::{resolve, ResolutionError, VideoId};
pub use transcribe::{AsrError, AsrFallback, SpeechRecognizer};
pub use transcript::{TranscriptResult, TranscriptSegment, TranscriptSource};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
