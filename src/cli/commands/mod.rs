//! Command execution functions for label intake operations.

mod resolve;
mod tools;

pub use resolve::resolve;
pub use tools::{report_tools, warn_missing_tools};

use crate::error::Result;
use crate::pipeline::Settings;
use anyhow::Context;
use std::path::Path;

/// Loads settings from `path`, or defaults when no file is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            let settings = Settings::from_toml_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            log::debug!("Loaded settings from {}", path.display());
            Ok(settings)
        }
        None => Ok(Settings::default()),
    }
}
