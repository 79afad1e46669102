//! Command-line interface for tnr.
//!
//! Only the self-update surface lives here; every other tnr command talks to
//! the Thunder Compute API and is out of this crate's scope.
//!
//! # Commands
//!
//! - `update` - check for and install new releases
//! - `version` - print the running version
//!
//! # Global Options
//!
//! - `--verbose` - enable debug logging
//! - `--quiet` - only log errors
//!
//! Every command except `update` starts the background update check before
//! it runs (see [`maybe_start_background_update`]).

pub mod update;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::upgrade::{UpdateConfig, maybe_start_background_update};

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(
    name = "tnr",
    about = "Thunder Compute command-line tool",
    version = crate::upgrade::build_version(),
    long_about = "tnr manages Thunder Compute instances and keeps itself up to date."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check for and install tnr updates
    Update(update::UpdateArgs),

    /// Print the tnr version
    Version,
}

impl Cli {
    /// Default log filter for these flags, used when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    /// Runs the selected command with configuration read from the environment.
    pub async fn execute(self) -> Result<()> {
        self.execute_with_config(UpdateConfig::from_env()).await
    }

    /// Runs the selected command with an explicit configuration.
    pub async fn execute_with_config(self, config: UpdateConfig) -> Result<()> {
        if !matches!(self.command, Commands::Update(_))
            && maybe_start_background_update(&config).await.is_some()
        {
            debug!("Background update started");
        }

        match self.command {
            Commands::Update(args) => update::execute(args, config).await,
            Commands::Version => {
                println!("tnr {}", config.current_version);
                Ok(())
            }
        }
    }
}
