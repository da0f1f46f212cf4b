use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcriptor",
    about = "ytscribe - Time-coded YouTube transcripts from captions, with an AWS Transcribe fallback",
    version,
    long_about = "Resolves a YouTube URL or video id, returns its captions as a time-coded transcript and, when a video has no usable captions, downloads the audio and transcribes it with AWS Transcribe. Runs as an HTTP service or as a one-shot command."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(long, global = true, value_name = "FILE", env = "YTSCRIBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP transcript service
    Serve {
        /// Address to bind (overrides the configuration file)
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides the configuration file)
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Fetch the transcript of one video
    Transcript {
        /// YouTube URL or 11-character video id
        #[arg(value_name = "URL_OR_ID")]
        reference: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Preferred caption languages, most preferred first (repeatable)
        #[arg(short, long = "language", value_name = "LANG")]
        languages: Vec<String>,
    },

    /// Print the canonical video id of a reference
    Resolve {
        /// YouTube URL or 11-character video id
        #[arg(value_name = "URL_OR_ID")]
        reference: String,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the current configuration to the config file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Timestamped plain text
    Text,
    /// Full result as JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
