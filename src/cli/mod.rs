//! Command line interface for label intake.
//!
//! This module provides the CLI for resolution runs, with argument parsing,
//! command execution, and user feedback.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, ResolveArgs, RuntimeConfig};
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    let runtime_config = RuntimeConfig::from(&args);

    match &args.command {
        Command::Resolve(resolve) => commands::resolve(resolve, &runtime_config).await,
        Command::Tools { config } => {
            let settings = commands::load_settings(config.as_deref())?;
            commands::report_tools(&settings, &runtime_config)
        }
    }
}
