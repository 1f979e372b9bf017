//! External tool program overrides.

use serde::Deserialize;

/// Program names (or absolute paths) used for each external tool.
///
/// # Configuration
///
/// ```toml
/// [tools]
/// unzip = "/usr/bin/unzip"
/// hdiutil = "/usr/bin/hdiutil"
/// ```
///
/// Unset entries fall back to the bare program name resolved through `PATH`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Zip extractor. Default: `unzip`
    pub unzip: String,

    /// Tar extractor. Default: `tar`
    pub tar: String,

    /// Disk image utility. Default: `hdiutil`
    pub hdiutil: String,

    /// Installer package utility. Default: `pkgutil`
    pub pkgutil: String,

    /// Code signature utility. Default: `codesign`
    pub codesign: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            unzip: "unzip".into(),
            tar: "tar".into(),
            hdiutil: "hdiutil".into(),
            pkgutil: "pkgutil".into(),
            codesign: "codesign".into(),
        }
    }
}
