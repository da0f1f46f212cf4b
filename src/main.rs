use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ytscribe::cli::{Cli, Commands};
use ytscribe::config::Config;
use ytscribe::{output, resolve, server, utils, TranscriptPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Resolve { reference } => {
            let id = resolve(&reference)?;
            println!("{}", id);
        }
        Commands::Config { show, init } => {
            let config = match cli.config.as_deref() {
                Some(path) if init && !path.exists() => Config::default(),
                path => Config::load(path)?,
            };
            if init {
                let path = config.save(cli.config.as_deref())?;
                println!("Configuration written to: {}", path.display());
            } else {
                if show {
                    config.display();
                }
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::config_path()?,
                };
                println!("Config file: {}", path.display());
            }
        }
        Commands::Serve { host, port } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            // Missing tools only disable the audio fallback
            for dep in utils::check_dependencies(&config.download.yt_dlp_path).await {
                tracing::warn!("Dependency check: {} not found", dep);
            }

            let pipeline = TranscriptPipeline::from_config(&config).await?;
            server::serve(&config.server, Arc::new(pipeline)).await?;
        }
        Commands::Transcript { reference, output: path, format, languages } => {
            let config = Config::load(cli.config.as_deref())?;
            let pipeline = TranscriptPipeline::from_config(&config).await?;
            let languages = if languages.is_empty() {
                pipeline.languages().to_vec()
            } else {
                languages
            };

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                ProgressBar::new_spinner()
            };
            progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
            progress.set_message(format!("Fetching transcript for {}...", reference));
            progress.enable_steady_tick(Duration::from_millis(120));

            let outcome = pipeline.run_with_languages(&reference, &languages).await;
            progress.finish_and_clear();

            let result = outcome?;
            match path {
                Some(path) => {
                    output::save_to_file(&result, &path, &format)?;
                    println!("Transcript ({}) saved to: {}", result.source, path.display());
                }
                None => output::print_to_console(&result, &format)?,
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "ytscribe=debug,tower_http=debug"
    } else {
        "ytscribe=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
