//! Command-line interface for pushbuild.
//!
//! Provides commands for serving the webhook endpoint, handling a single
//! event from a file or stdin, and inspecting the resolved configuration.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, BridgeConfig};
use crate::core::Orchestrator;
use crate::server;

/// pushbuild - Turn repository push events into CI builds
#[derive(Parser, Debug)]
#[command(name = "pushbuild")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .pushbuild/config.yaml in this or a parent directory)
    #[arg(long, global = true, env = "PUSHBUILD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the webhook HTTP server
    Serve {
        /// Address to bind to (overrides server.address)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Handle one push event and print the outcome
    Handle {
        /// Event file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::load(self.config.as_deref())?;

        match self.command {
            Commands::Serve { address } => serve(&config, address).await,
            Commands::Handle { input } => handle_event(&config, input).await,
            Commands::Config => show_config(&config),
        }
    }
}

async fn serve(config: &BridgeConfig, address: Option<String>) -> Result<()> {
    let orchestrator = Arc::new(Orchestrator::from_config(config)?);
    let address = address.unwrap_or_else(|| config.server.address.clone());
    server::serve(orchestrator, &address, &config.server.path).await
}

/// Run one invocation outside the server
async fn handle_event(config: &BridgeConfig, input_file: Option<PathBuf>) -> Result<()> {
    let body = if let Some(path) = input_file {
        std::fs::read(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    };

    let orchestrator = Orchestrator::from_config(config)?;

    match orchestrator.handle(&body).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("[{}] {}", e.code(), e);
            std::process::exit(1);
        }
    }
}

fn show_config(config: &BridgeConfig) -> Result<()> {
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Artifact:    {}/{}", config.storage.bucket, config.artifact_key());
    println!(
        "Builds:      {}",
        config.build.endpoint.as_deref().unwrap_or("(dry run)")
    );
    println!();
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
