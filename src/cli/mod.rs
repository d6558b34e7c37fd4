pub mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "newsproxy")]
#[command(about = "Caching news API proxy with readable full-article extraction")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NEWSPROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP proxy until interrupted
    Serve {
        /// Address to bind, overrides the configuration
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overrides the configuration
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch one article and print the extracted payload as JSON
    Extract {
        /// Article URL
        url: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        if let Commands::Completions { shell } = self.command {
            commands::generate_completions(shell);
            return Ok(());
        }

        let config = Config::resolve(self.config.clone()).context("Failed to load configuration")?;
        let _guard = commands::init_logging(&config.logging, self.debug, self.verbose)?;

        match self.command {
            Commands::Serve { host, port } => commands::serve(config, host, port).await,
            Commands::Extract { url } => commands::extract(&config, &url).await,
            Commands::Completions { .. } => Ok(()),
        }
    }
}
