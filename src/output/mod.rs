use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::transcript::{TranscriptResult, TranscriptSegment};

/// Render `start` seconds as `HH:MM:SS`, flooring fractional seconds.
///
/// Hours are not wrapped, so a ten hour offset renders as `10:00:00`.
pub fn format_timestamp(start: f64) -> String {
    let total_seconds = if start.is_finite() && start > 0.0 {
        start.floor() as u64
    } else {
        0
    };
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Render segments as timestamp/text blocks separated by a blank line
pub fn format_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|segment| format!("{}\n{}", format_timestamp(segment.start), segment.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a result in the requested CLI output format
pub fn render(result: &TranscriptResult, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(result.formatted_text.clone()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).context("Failed to serialize transcript")
        }
    }
}

/// Save transcript result to file
pub fn save_to_file(result: &TranscriptResult, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print transcript result to console
pub fn print_to_console(result: &TranscriptResult, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    println!("{}", content);
    Ok(())
}
