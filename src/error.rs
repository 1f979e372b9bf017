//! Crate-level error types for the CLI.
//!
//! Pipeline failures keep their own taxonomy in [`crate::pipeline::Error`];
//! this module wraps them together with argument and output errors.

use crate::pipeline::Error as PipelineError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Main error type for all CLI operations
#[derive(Error, Debug)]
pub enum IntakeError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Pipeline errors
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Generic errors from anyhow
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

impl IntakeError {
    /// Short suggestion for errors with an obvious remedy.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            IntakeError::Pipeline(PipelineError::ToolSpawn { .. }) => {
                Some("install the Xcode command line tools or set the program under [tools] in the config file")
            }
            IntakeError::Pipeline(PipelineError::ToolTimeout { .. }) => {
                Some("raise tool_timeout_secs in the config file")
            }
            IntakeError::Pipeline(PipelineError::MissingArtifact { .. }) => {
                Some("check that --type matches how the vendor ships this download")
            }
            IntakeError::Pipeline(PipelineError::Mount(_)) => {
                Some("run `hdiutil info` to look for images left attached")
            }
            _ => None,
        }
    }
}
