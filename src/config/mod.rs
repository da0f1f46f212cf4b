use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Captions provider settings
    pub captions: CaptionsConfig,

    /// Audio download settings
    pub download: DownloadConfig,

    /// Speech recognition fallback settings
    pub asr: AsrConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    /// Preferred caption languages, most preferred first
    pub languages: Vec<String>,

    /// Timeout for each captions provider request
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// yt-dlp format selector
    pub format: String,

    /// Audio format yt-dlp converts to
    pub audio_format: String,

    /// Timeout for one audio download
    pub timeout_secs: u64,

    /// Parent directory for per-request scratch directories
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrConfig {
    /// Allow the audio transcription fallback
    pub enabled: bool,

    /// AWS region
    pub region: String,

    /// S3 bucket for temporary audio storage (fallback is unconfigured when empty)
    pub s3_bucket: String,

    /// Optional S3 key prefix
    pub s3_key_prefix: Option<String>,

    /// Language code for transcription (auto-detect if not specified)
    pub language: Option<String>,

    /// Maximum segment length in seconds
    pub max_segment_length: f64,

    /// Initial delay between job status checks
    pub poll_interval_secs: u64,

    /// Timeout for one transcription, upload to result
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            timeout_secs: 20,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            format: "bestaudio/best".to_string(),
            audio_format: "mp3".to_string(),
            timeout_secs: 600,
            temp_dir: None,
        }
    }
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            region: "us-east-1".to_string(),
            s3_bucket: "".to_string(),
            s3_key_prefix: Some("ytscribe/".to_string()),
            language: None,
            max_segment_length: 10.0,
            poll_interval_secs: 5,
            timeout_secs: 1800,
        }
    }
}

impl Config {
    /// Load configuration from `path`, the default locations, or fall back to defaults.
    ///
    /// Environment overrides are applied after the file is read.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path().ok().filter(|path| path.exists()),
        };

        let mut config = match config_path {
            Some(config_path) => {
                tracing::debug!("Loading configuration from {}", config_path.display());
                let content = fs_err::read_to_string(&config_path)
                    .context("Failed to read config file")?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("ytscribe").join("config.yaml"))
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = var("YTSCRIBE_S3_BUCKET") {
            self.asr.s3_bucket = bucket.trim().to_string();
        }

        if let Some(region) = var("AWS_REGION").filter(|r| !r.trim().is_empty()) {
            self.asr.region = region.trim().to_string();
        }

        if let Some(languages) = var("YTSCRIBE_LANGUAGES") {
            let parsed = parse_language_list(&languages);
            if !parsed.is_empty() {
                self.captions.languages = parsed;
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.captions.languages.is_empty() {
            anyhow::bail!("At least one caption language must be configured");
        }

        if self.captions.timeout_secs == 0
            || self.download.timeout_secs == 0
            || self.asr.timeout_secs == 0
        {
            anyhow::bail!("Timeouts must be greater than zero");
        }

        if self.asr.max_segment_length <= 0.0 {
            anyhow::bail!("Maximum segment length must be positive");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        println!("  Caption Languages: {}", self.captions.languages.join(", "));
        println!("  yt-dlp: {}", self.download.yt_dlp_path);
        println!("  ASR Enabled: {}", self.asr.enabled);
        println!("  AWS Region: {}", self.asr.region);
        if self.asr.s3_bucket.is_empty() {
            println!("  S3 Bucket: (not set, audio fallback disabled)");
        } else {
            println!("  S3 Bucket: {}", self.asr.s3_bucket);
        }
        if let Some(prefix) = &self.asr.s3_key_prefix {
            println!("  S3 Prefix: {}", prefix);
        }
    }

    pub fn captions_timeout(&self) -> Duration {
        Duration::from_secs(self.captions.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download.timeout_secs)
    }

    pub fn asr_timeout(&self) -> Duration {
        Duration::from_secs(self.asr.timeout_secs)
    }
}

/// Split a comma separated language list, dropping blanks
pub fn parse_language_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.captions.languages, vec!["en"]);
        assert!(config.asr.s3_bucket.is_empty());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = Config::from_yaml(
            "captions:\n  languages: [de, en]\nasr:\n  s3_bucket: my-bucket\n",
        )
        .unwrap();
        assert_eq!(config.captions.languages, vec!["de", "en"]);
        assert_eq!(config.captions.timeout_secs, 20);
        assert_eq!(config.asr.s3_bucket, "my-bucket");
        assert_eq!(config.asr.region, "us-east-1");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("YTSCRIBE_S3_BUCKET", " audio-bucket "),
            ("AWS_REGION", "eu-west-1"),
            ("YTSCRIBE_LANGUAGES", "fr, en ,,"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.asr.s3_bucket, "audio-bucket");
        assert_eq!(config.asr.region, "eu-west-1");
        assert_eq!(config.captions.languages, vec!["fr", "en"]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.captions.languages.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.server.port = 9100;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.server.port, 9100);
    }
}
