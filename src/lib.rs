//! Label intake library for packaging macOS software for Intune
//!
//! Downloads a vendor artifact, unwraps it according to its declared
//! container type (zip, tar, disk image, or combinations), and extracts the
//! identity and signature of the innermost installer package or app bundle.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use error::{CliError, IntakeError, Result};
pub use pipeline::{DeclaredType, FinalizeMode, Outcome, Pipeline, Settings};
