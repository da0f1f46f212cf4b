use anyhow::{Context, Result};
use aws_sdk_transcribe::types::{TranscriptionJob, TranscriptionJobStatus};
use aws_sdk_transcribe::Client as TranscribeClient;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::RecognizedSegment;

/// Longest wait between two job status checks
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Silence that always starts a new segment, in seconds
const SEGMENT_GAP: f64 = 1.0;

/// AWS Transcribe transcript format
#[derive(Debug, Deserialize)]
pub struct AwsTranscript {
    pub results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptResults {
    #[serde(default)]
    pub items: Vec<TranscriptItem>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptItem {
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(rename = "type")]
    item_type: String,
    alternatives: Vec<Alternative>,
    speaker_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    content: String,
}

/// Transcription job processor
pub struct TranscriptionProcessor {
    client: TranscribeClient,
    job_name: String,
    max_segment_length: f64,
    poll_interval: Duration,
    http: reqwest::Client,
}

impl TranscriptionProcessor {
    pub fn new(
        client: TranscribeClient,
        job_name: String,
        max_segment_length: f64,
        poll_interval: Duration,
        http: reqwest::Client,
    ) -> Self {
        Self { client, job_name, max_segment_length, poll_interval, http }
    }

    /// Wait for job completion until `deadline`, then fetch and segment the transcript
    pub async fn wait_for_completion(&self, deadline: Instant) -> Result<Vec<RecognizedSegment>> {
        let started = Instant::now();
        let mut check_count = 0u32;

        let job = loop {
            check_count += 1;

            let job = self.get_transcription_job().await?;

            match job.transcription_job_status() {
                Some(TranscriptionJobStatus::Completed) => break job,
                Some(TranscriptionJobStatus::Failed) => {
                    let failure_reason = job.failure_reason().unwrap_or("Unknown error");
                    anyhow::bail!("Transcription job failed: {}", failure_reason);
                }
                Some(TranscriptionJobStatus::InProgress) | Some(TranscriptionJobStatus::Queued) => {
                    let wait = self.poll_delay(check_count);
                    if Instant::now() + wait > deadline {
                        anyhow::bail!(
                            "Transcription job {} still running after {}s",
                            self.job_name,
                            started.elapsed().as_secs()
                        );
                    }

                    tracing::debug!(
                        "Job {} in progress ({}s elapsed, check #{})",
                        self.job_name,
                        started.elapsed().as_secs(),
                        check_count
                    );
                    sleep(wait).await;
                }
                _ => anyhow::bail!("Unexpected transcription job status"),
            }
        };

        tracing::info!(
            "Transcription job {} completed in {}s",
            self.job_name,
            started.elapsed().as_secs()
        );

        let transcript_uri = job
            .transcript()
            .and_then(|t| t.transcript_file_uri())
            .ok_or_else(|| anyhow::anyhow!("No transcript URI found"))?;

        let transcript_json = self.download_transcript(transcript_uri).await?;
        let transcript: AwsTranscript = serde_json::from_str(&transcript_json)
            .context("Failed to parse transcript JSON")?;

        Ok(group_items(&transcript.results.items, self.max_segment_length))
    }

    /// Backoff that grows by two seconds per check, capped at thirty
    fn poll_delay(&self, check_count: u32) -> Duration {
        let grown = self.poll_interval + Duration::from_secs(2 * u64::from(check_count.saturating_sub(1)));
        grown.min(MAX_POLL_INTERVAL)
    }

    /// Get transcription job details
    async fn get_transcription_job(&self) -> Result<TranscriptionJob> {
        let response = self
            .client
            .get_transcription_job()
            .transcription_job_name(&self.job_name)
            .send()
            .await
            .context("Failed to get transcription job status")?;

        response
            .transcription_job()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Transcription job not found"))
    }

    /// Download the transcript document from its presigned URI
    async fn download_transcript(&self, uri: &str) -> Result<String> {
        let response = self.http.get(uri).send().await.context("Failed to download transcript")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download transcript: HTTP {}", response.status());
        }

        response.text().await.context("Failed to read transcript content")
    }
}

/// Group word items into segments.
///
/// A new segment starts on speaker change, on a gap longer than a second, once the
/// segment exceeds `max_segment_length`, or at a sentence end past half that length.
pub fn group_items(items: &[TranscriptItem], max_segment_length: f64) -> Vec<RecognizedSegment> {
    let mut segments = Vec::new();
    let mut current_text = String::new();
    let mut current_start: Option<f64> = None;
    let mut current_end: Option<f64> = None;
    let mut current_speaker: Option<&str> = None;

    let mut flush = |text: &mut String, start: Option<f64>, end: Option<f64>| {
        let trimmed = text.trim();
        if let (false, Some(start)) = (trimmed.is_empty(), start) {
            segments.push(RecognizedSegment {
                start,
                duration: end.map(|end| (end - start).max(0.0)),
                text: trimmed.to_string(),
            });
        }
        text.clear();
    };

    for item in items {
        let content = item
            .alternatives
            .first()
            .map(|alt| alt.content.as_str())
            .unwrap_or_default();

        if item.item_type == "punctuation" {
            current_text.push_str(content);
            continue;
        }

        if item.item_type != "pronunciation" {
            continue;
        }

        let start = item.start_time.as_deref().and_then(|s| s.parse::<f64>().ok());
        let end = item.end_time.as_deref().and_then(|s| s.parse::<f64>().ok());
        let speaker = item.speaker_label.as_deref();

        let elapsed = current_start.zip(start).map(|(seg_start, now)| now - seg_start);
        let speaker_changed = current_speaker != speaker;
        let time_gap = start
            .zip(current_end)
            .map(|(start, end)| start - end > SEGMENT_GAP)
            .unwrap_or(false);
        let too_long = elapsed.map(|e| e > max_segment_length).unwrap_or(false);
        let sentence_ended = current_text.ends_with(['.', '!', '?'])
            && elapsed.map(|e| e > max_segment_length / 2.0).unwrap_or(false);

        if current_text.is_empty() || speaker_changed || time_gap || too_long || sentence_ended {
            flush(&mut current_text, current_start, current_end);
            current_text.push_str(content);
            current_start = start;
            current_end = end;
            current_speaker = speaker;
        } else {
            current_text.push(' ');
            current_text.push_str(content);
            current_end = end.or(current_end);
        }
    }

    flush(&mut current_text, current_start, current_end);
    segments
}
