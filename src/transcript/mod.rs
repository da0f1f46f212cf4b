use serde::{Deserialize, Serialize};
use std::fmt;

use crate::resolver::VideoId;

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds (zero when the source does not report one)
    pub duration: f64,

    /// Segment text, trimmed and never empty
    pub text: String,
}

impl TranscriptSegment {
    /// Build a normalized segment, or `None` if no text remains after cleanup.
    ///
    /// Line breaks collapse to a single space, surrounding whitespace is trimmed and
    /// negative or non-finite times are clamped to zero.
    pub fn normalized(start: f64, duration: Option<f64>, text: &str) -> Option<Self> {
        let text = collapse_line_breaks(text);
        if text.is_empty() {
            return None;
        }

        Some(Self {
            start: non_negative(start),
            duration: duration.map(non_negative).unwrap_or(0.0),
            text,
        })
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Replace every run of `\r`/`\n` with one space and trim the result
pub fn collapse_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;

    for c in text.chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }

    out.trim().to_string()
}

/// Which upstream produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    Captions,
    AsrFallback,
}

impl TranscriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptSource::Captions => "captions",
            TranscriptSource::AsrFallback => "asr_fallback",
        }
    }
}

impl fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one successful pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResult {
    #[serde(rename = "video_id")]
    pub identifier: VideoId,

    /// Reference exactly as the caller supplied it
    #[serde(rename = "video_url")]
    pub reference: String,

    pub segments: Vec<TranscriptSegment>,

    #[serde(rename = "formatted")]
    pub formatted_text: String,

    pub source: TranscriptSource,
}
