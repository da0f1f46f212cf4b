use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{AudioFormat, MediaDownloader};
use crate::config::DownloadConfig;
use crate::Result;

/// Base name of the downloaded audio inside the scratch directory
const AUDIO_STEM: &str = "audio";

/// YouTube audio downloader using yt-dlp
pub struct YtDlpDownloader {
    yt_dlp_path: String,
    format: String,
    audio_format: String,
}

impl YtDlpDownloader {
    pub fn new(config: &DownloadConfig) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            format: config.format.clone(),
            audio_format: config.audio_format.clone(),
        }
    }

    fn download_args(&self, reference: &str, dest_dir: &Path) -> Vec<String> {
        let template = dest_dir.join(format!("{}.%(ext)s", AUDIO_STEM));

        vec![
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--format".to_string(),
            self.format.clone(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.audio_format.clone(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--concurrent-fragments".to_string(),
            "4".to_string(),
            // a reference may start with '-' (ids allow it)
            "--".to_string(),
            reference.to_string(),
        ]
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    async fn fetch_audio(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf> {
        tracing::debug!("Downloading audio for {} into {}", reference, dest_dir.display());

        let output = Command::new(&self.yt_dlp_path)
            .args(self.download_args(reference, dest_dir))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.yt_dlp_path))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to download audio: yt-dlp {}: {}", output.status, error.trim());
        }

        find_audio_file(dest_dir, &self.audio_format)
    }
}

/// Locate the audio yt-dlp produced, preferring the requested format
fn find_audio_file(dest_dir: &Path, audio_format: &str) -> Result<PathBuf> {
    let expected = dest_dir.join(format!("{}.{}", AUDIO_STEM, audio_format));
    if expected.is_file() {
        return Ok(expected);
    }

    let mut fallback = None;
    for entry in fs_err::read_dir(dest_dir)? {
        let path = entry?.path();
        let is_audio_stem = path.file_stem().and_then(|s| s.to_str()) == Some(AUDIO_STEM);
        if path.is_file() && is_audio_stem && AudioFormat::from_path(&path).is_some() {
            fallback = Some(path);
            break;
        }
    }

    fallback.ok_or_else(|| anyhow::anyhow!("yt-dlp finished without producing an audio file"))
}
