//! tnr CLI entry point
//!
//! Startup order matters:
//! 1. elevated helper invocations are dispatched before anything else
//! 2. logging is initialised
//! 3. a staged update is finalized (synchronous, before the runtime starts)
//! 4. arguments are parsed and the command runs

use clap::Parser;
use tnr_cli::cli;
use tnr_cli::core::error::user_friendly_error;
use tnr_cli::upgrade::{UpdateConfig, finalize_at_startup, maybe_run_helper};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Some(code) = maybe_run_helper(args.get(1..).unwrap_or_default()) {
        std::process::exit(code);
    }

    let cli = cli::Cli::parse();
    init_logging(cli.log_level());

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    finalize_at_startup(&UpdateConfig::from_env());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            user_friendly_error(e.into()).display();
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(cli.execute()) {
        // Convert to user-friendly error with context and suggestions
        user_friendly_error(e).display();
        std::process::exit(1);
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}
