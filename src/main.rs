//! a3s-moderation - run prompts through the moderation pipeline
//!
//! Prompts come from the command line, or one per line on stdin when none
//! are given. Each result is printed on its own line.

use a3s_moderation::{
    run_pipeline, standard_pipeline, Collaborators, HttpServices, ModerationConfig,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "a3s-moderation")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Moderation pipeline for conversational AI")]
struct Cli {
    /// Configuration file path (.json)
    #[arg(short, long, env = "A3S_MODERATION_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Prompts to moderate (reads stdin when omitted)
    prompts: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only pipeline output
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("a3s_moderation={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => ModerationConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ModerationConfig::default(),
    };

    let collaborators = match &config.service {
        Some(service) => {
            let services = HttpServices::new(service.clone())
                .context("Failed to initialize moderation service client")?;
            Collaborators::remote(&services, &config)
        }
        None => {
            tracing::info!("Using in-memory collaborators");
            Collaborators::in_memory(&config)?
        }
    };

    let pipeline = standard_pipeline(&config, &collaborators)
        .context("Failed to assemble moderation pipeline")?;

    let mut stdout = tokio::io::stdout();
    if cli.prompts.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let output = run_pipeline(&pipeline, &line).await;
            stdout.write_all(format!("{}\n", output).as_bytes()).await?;
            stdout.flush().await?;
        }
    } else {
        for prompt in &cli.prompts {
            let output = run_pipeline(&pipeline, prompt).await;
            stdout.write_all(format!("{}\n", output).as_bytes()).await?;
        }
        stdout.flush().await?;
    }

    Ok(())
}
