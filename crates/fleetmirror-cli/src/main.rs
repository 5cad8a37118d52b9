//! Fleetmirror CLI - inspect checkpoints and replay recorded streams

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleetmirror::FleetConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "fleetmirror")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory of the LMDB checkpoint store (overrides the config file)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored checkpoint of each mirror
    Status {
        /// Mirrors to show; all stored checkpoints when omitted
        mirrors: Vec<String>,
    },

    /// Replay recorded change and telemetry streams through the coordinator
    Replay {
        /// JSON-lines file of remote changes
        #[arg(long)]
        changes: PathBuf,

        /// JSON-lines file of telemetry deliveries
        #[arg(long)]
        telemetry: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<FleetConfig> {
    let mut config = match &cli.config {
        Some(path) => FleetConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FleetConfig::default(),
    };
    if let Some(path) = &cli.store_path {
        config.lmdb.path = path.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Status { mirrors } => {
            commands::status::execute(&config, &mirrors).await?;
        }
        Commands::Replay { changes, telemetry } => {
            commands::replay::execute(&config, changes, telemetry).await?;
        }
    }

    Ok(())
}
