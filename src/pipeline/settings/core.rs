//! Core Settings struct and implementations.

use super::ToolSettings;
use crate::pipeline::error::{ErrorExt, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default deadline for a single external tool invocation.
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;

/// Default depth limit for the recursive package search inside zip archives.
///
/// Vendor archives rarely nest more than four or five directories deep.
const DEFAULT_SEARCH_DEPTH: usize = 32;

/// Main settings for pipeline operations.
///
/// Constructed via [`SettingsBuilder`](super::SettingsBuilder) or loaded from a
/// TOML file with [`Settings::from_toml_file`].
///
/// # Configuration
///
/// ```toml
/// temp_root = "/private/tmp/intake"
/// tool_timeout_secs = 300
/// search_depth = 16
/// fallback_file_name = "download"
///
/// [tools]
/// unzip = "/usr/bin/unzip"
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory under which workspaces are allocated.
    ///
    /// Default: the system temporary directory
    pub(super) temp_root: PathBuf,

    /// Prefix of every workspace directory name.
    pub(super) workspace_prefix: String,

    /// Deadline per subprocess, in seconds.
    pub(super) tool_timeout_secs: u64,

    /// Connect timeout for downloads, in seconds. No overall transfer deadline.
    pub(super) connect_timeout_secs: Option<u64>,

    /// Depth limit for the recursive package search.
    pub(super) search_depth: usize,

    /// File name used when neither the response headers nor the URL provide one.
    pub(super) fallback_file_name: String,

    /// User-Agent header for downloads.
    pub(super) user_agent: String,

    /// Run license-agreement normalization for app-bearing disk images too.
    pub(super) normalize_app_images: bool,

    /// Minimum interval between two progress events, in milliseconds.
    pub(super) progress_interval_ms: u64,

    /// External tool program names.
    pub(super) tools: ToolSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir(),
            workspace_prefix: "label-intake".into(),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            connect_timeout_secs: Some(30),
            search_depth: DEFAULT_SEARCH_DEPTH,
            fallback_file_name: "download".into(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
            normalize_app_images: false,
            progress_interval_ms: 250,
            tools: ToolSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).fs_context("reading settings file", path)?;
        Self::from_toml_str(&text)
    }

    /// Parses settings from TOML text and validates them like the builder does.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| {
            crate::pipeline::Error::GenericError(format!("invalid settings: {e}"))
        })?;
        super::SettingsBuilder::from_settings(settings).build()
    }

    /// Returns the directory workspaces are created in.
    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Returns the workspace directory name prefix.
    pub fn workspace_prefix(&self) -> &str {
        &self.workspace_prefix
    }

    /// Returns the per-subprocess deadline.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Returns the download connect timeout, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Returns the depth limit for the recursive package search.
    pub fn search_depth(&self) -> usize {
        self.search_depth
    }

    /// Returns the fallback download file name.
    pub fn fallback_file_name(&self) -> &str {
        &self.fallback_file_name
    }

    /// Returns the download User-Agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Whether app-bearing disk images are license-normalized before attach.
    pub fn normalize_app_images(&self) -> bool {
        self.normalize_app_images
    }

    /// Returns the minimum interval between progress events.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Returns the external tool program names.
    pub fn tools(&self) -> &ToolSettings {
        &self.tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_keeps_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.tool_timeout(), Duration::from_secs(600));
        assert_eq!(settings.fallback_file_name(), "download");
        assert_eq!(settings.tools().hdiutil, "hdiutil");
        assert!(!settings.normalize_app_images());
    }

    #[test]
    fn toml_overrides_nested_tools() {
        let settings = Settings::from_toml_str(
            r#"
            tool_timeout_secs = 5
            search_depth = 4
            [tools]
            unzip = "/opt/bin/unzip"
            "#,
        )
        .unwrap();
        assert_eq!(settings.tool_timeout(), Duration::from_secs(5));
        assert_eq!(settings.search_depth(), 4);
        assert_eq!(settings.tools().unzip, "/opt/bin/unzip");
        assert_eq!(settings.tools().tar, "tar");
    }

    #[test]
    fn unknown_value_type_is_rejected() {
        assert!(Settings::from_toml_str("search_depth = \"deep\"").is_err());
    }

    #[test]
    fn loaded_values_are_validated() {
        assert!(Settings::from_toml_str("tool_timeout_secs = 0").is_err());
        assert!(Settings::from_toml_str("fallback_file_name = \"a/b\"").is_err());
    }
}
