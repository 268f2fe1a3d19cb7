//! CLI command implementations.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod serve;

use clap::{Parser, Subcommand};

use crate::{GraphConfig, Result};

/// Command-line interface for the knowledge-graph service.
#[derive(Debug, Parser)]
#[command(name = "subcog-graph", version, about = "A durable, semantic knowledge-graph memory service over MCP")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the MCP server and its background workers.
    Serve,
    /// Load configuration from the environment and report whether it is valid.
    CheckConfig,
}

impl Cli {
    /// Dispatches to the selected subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or the selected command
    /// fails.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Serve => serve::execute(GraphConfig::from_env()?).await,
            Command::CheckConfig => match GraphConfig::from_env() {
                Ok(config) => {
                    println!("configuration OK (store_uri={}, health_port={})", config.store_uri, config.health_port);
                    Ok(())
                },
                Err(e) => {
                    eprintln!("configuration error: {e}");
                    Err(e)
                },
            },
        }
    }
}
