//! Builder for constructing Settings.

use super::{Settings, ToolSettings};
use crate::bail;
use std::path::{Path, PathBuf};

/// Builder for constructing [`Settings`].
///
/// Unset fields keep the values of [`Settings::default`].
///
/// # Examples
///
/// ```no_run
/// use label_intake::pipeline::SettingsBuilder;
///
/// # fn example() -> label_intake::pipeline::Result<()> {
/// let settings = SettingsBuilder::new()
///     .temp_root("/private/tmp/intake")
///     .tool_timeout_secs(120)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SettingsBuilder {
    base: Option<Settings>,
    temp_root: Option<PathBuf>,
    tool_timeout_secs: Option<u64>,
    search_depth: Option<usize>,
    fallback_file_name: Option<String>,
    normalize_app_images: Option<bool>,
    tools: Option<ToolSettings>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Starts from previously loaded settings instead of the defaults.
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            base: Some(settings),
            ..Default::default()
        }
    }

    /// Sets the directory workspaces are created in.
    pub fn temp_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.temp_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the per-subprocess deadline in seconds.
    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = Some(secs);
        self
    }

    /// Sets the depth limit for the recursive package search.
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.search_depth = Some(depth);
        self
    }

    /// Sets the fallback download file name.
    pub fn fallback_file_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_file_name = Some(name.into());
        self
    }

    /// Opts app-bearing disk images into license normalization.
    pub fn normalize_app_images(mut self, enabled: bool) -> Self {
        self.normalize_app_images = Some(enabled);
        self
    }

    /// Sets the external tool program names.
    pub fn tools(mut self, tools: ToolSettings) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero timeout, a zero search depth, or an empty
    /// or path-like fallback file name.
    pub fn build(self) -> crate::pipeline::Result<Settings> {
        let mut settings = self.base.unwrap_or_default();

        if let Some(root) = self.temp_root {
            settings.temp_root = root;
        }
        if let Some(secs) = self.tool_timeout_secs {
            settings.tool_timeout_secs = secs;
        }
        if let Some(depth) = self.search_depth {
            settings.search_depth = depth;
        }
        if let Some(name) = self.fallback_file_name {
            settings.fallback_file_name = name;
        }
        if let Some(enabled) = self.normalize_app_images {
            settings.normalize_app_images = enabled;
        }
        if let Some(tools) = self.tools {
            settings.tools = tools;
        }

        if settings.tool_timeout_secs == 0 {
            bail!("tool_timeout_secs must be greater than zero");
        }
        if settings.search_depth == 0 {
            bail!("search_depth must be greater than zero");
        }
        if matches!(settings.fallback_file_name.as_str(), "" | "." | "..")
            || settings.fallback_file_name.contains(['/', '\\'])
        {
            bail!(
                "fallback_file_name must be a plain file name, got {:?}",
                settings.fallback_file_name
            );
        }

        Ok(settings)
    }
}
