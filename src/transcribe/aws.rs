use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::Region;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_transcribe::types::{Media, MediaFormat};
use aws_sdk_transcribe::Client as TranscribeClient;
use aws_types::SdkConfig;
use std::path::Path;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::processor::TranscriptionProcessor;
use super::{RecognizedSegment, SpeechRecognizer};
use crate::config::AsrConfig;
use crate::extractors::AudioFormat;
use crate::utils::normalize_language_code;

/// How long start-up waits for the AWS credential chain
const CREDENTIALS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Speech recognizer backed by AWS Transcribe batch jobs
pub struct AwsTranscribeRecognizer {
    config: AsrConfig,
    s3_client: S3Client,
    transcribe_client: TranscribeClient,
    http: reqwest::Client,
    configured: bool,
}

impl AwsTranscribeRecognizer {
    /// Build clients from the default AWS chain and probe for credentials once.
    ///
    /// Probing is skipped when the fallback is disabled or has no bucket, so nothing
    /// touches the network unless the fallback can actually be used.
    pub async fn new(config: AsrConfig) -> Result<Self> {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let configured = if !config.enabled {
            tracing::info!("Audio transcription fallback disabled in configuration");
            false
        } else if config.s3_bucket.is_empty() {
            tracing::warn!("No S3 bucket configured, audio transcription fallback unavailable");
            false
        } else {
            let found = has_credentials(&aws_config).await;
            if !found {
                tracing::warn!("No AWS credentials found, audio transcription fallback unavailable");
            }
            found
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build transcript HTTP client")?;

        Ok(Self {
            s3_client: S3Client::new(&aws_config),
            transcribe_client: TranscribeClient::new(&aws_config),
            config,
            http,
            configured,
        })
    }

    /// Upload audio file to S3
    async fn upload_to_s3(&self, audio_path: &Path, format: AudioFormat) -> Result<S3Object> {
        let key = format!(
            "{}audio_{}_{}.{}",
            self.config.s3_key_prefix.as_deref().unwrap_or(""),
            Uuid::new_v4(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            format.as_str()
        );

        tracing::info!("Uploading audio to S3: s3://{}/{}", self.config.s3_bucket, key);

        let body = ByteStream::from_path(audio_path)
            .await
            .context("Failed to read downloaded audio")?;

        self.s3_client
            .put_object()
            .bucket(&self.config.s3_bucket)
            .key(&key)
            .body(body)
            .content_type(format.mime_type())
            .send()
            .await
            .context("Failed to upload audio to S3")?;

        Ok(S3Object {
            client: self.s3_client.clone(),
            bucket: self.config.s3_bucket.clone(),
            key,
        })
    }

    /// Start AWS Transcribe job with the configured language or automatic detection
    async fn start_transcription_job(&self, object: &S3Object, format: AudioFormat) -> Result<String> {
        let job_name = format!("ytscribe_{}", Uuid::new_v4());
        let media_uri = format!("s3://{}/{}", object.bucket, object.key);

        tracing::info!("Starting transcription job: {}", job_name);

        let media = Media::builder().media_file_uri(media_uri).build();

        let mut job_builder = self
            .transcribe_client
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .media_format(media_format(format))
            .media(media);

        if let Some(lang) = self.config.language.as_deref() {
            let code = normalize_language_code(lang);
            tracing::debug!("Using language: {}", code);
            job_builder = job_builder.language_code(code.as_str().into());
        } else {
            job_builder = job_builder.identify_language(true);
        }

        job_builder
            .send()
            .await
            .context("Failed to start transcription job")?;

        Ok(job_name)
    }
}

#[async_trait]
impl SpeechRecognizer for AwsTranscribeRecognizer {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<RecognizedSegment>> {
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let format = AudioFormat::from_path(audio_path)
            .ok_or_else(|| anyhow::anyhow!("Unsupported audio format: {}", audio_path.display()))?;

        let mut object = self.upload_to_s3(audio_path, format).await?;
        let job_name = self.start_transcription_job(&object, format).await?;

        let result = TranscriptionProcessor::new(
            self.transcribe_client.clone(),
            job_name,
            self.config.max_segment_length,
            Duration::from_secs(self.config.poll_interval_secs.max(1)),
            self.http.clone(),
        )
        .wait_for_completion(deadline)
        .await;

        object.delete().await;
        result
    }
}

/// Uploaded audio object, deleted explicitly or, failing that, when dropped
struct S3Object {
    client: S3Client,
    bucket: String,
    key: String,
}

impl S3Object {
    /// The key is cleared only once the request returns, so a cancelled delete
    /// still leaves the cleanup to `Drop`.
    async fn delete(&mut self) {
        delete_object(&self.client, &self.bucket, &self.key).await;
        self.key.clear();
    }
}

impl Drop for S3Object {
    fn drop(&mut self) {
        if self.key.is_empty() {
            return;
        }

        // dropped mid-flight (timeout or panic): finish cleanup in the background
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            let bucket = self.bucket.clone();
            let key = std::mem::take(&mut self.key);
            handle.spawn(async move { delete_object(&client, &bucket, &key).await });
        }
    }
}

async fn delete_object(client: &S3Client, bucket: &str, key: &str) {
    tracing::debug!("Cleaning up S3 object: s3://{}/{}", bucket, key);

    if let Err(e) = client.delete_object().bucket(bucket).key(key).send().await {
        tracing::warn!("Failed to clean up S3 object s3://{}/{}: {}", bucket, key, e);
    }
}

async fn has_credentials(config: &SdkConfig) -> bool {
    let Some(provider) = config.credentials_provider() else {
        return false;
    };

    matches!(
        tokio::time::timeout(CREDENTIALS_PROBE_TIMEOUT, provider.provide_credentials()).await,
        Ok(Ok(_))
    )
}

fn media_format(format: AudioFormat) -> MediaFormat {
    match format {
        AudioFormat::Mp3 => MediaFormat::Mp3,
        AudioFormat::M4a => MediaFormat::Mp4,
        AudioFormat::Wav => MediaFormat::Wav,
        AudioFormat::Flac => MediaFormat::Flac,
        AudioFormat::Ogg => MediaFormat::Ogg,
        AudioFormat::Webm => MediaFormat::Webm,
    }
}
