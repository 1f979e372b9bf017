//! External tool detection and availability checking.

use super::Tool;
use crate::pipeline::settings::ToolSettings;
use std::path::PathBuf;

/// Result of looking up one tool.
#[derive(Clone, Debug)]
pub struct ToolAvailability {
    /// Tool that was looked up
    pub tool: Tool,
    /// Configured program name or path
    pub program: String,
    /// Resolved location, `None` when not found
    pub location: Option<PathBuf>,
}

impl ToolAvailability {
    /// Whether the program was found.
    pub fn is_available(&self) -> bool {
        self.location.is_some()
    }
}

/// Looks up every configured tool on `PATH` (or at its absolute path).
pub fn check_tools(programs: &ToolSettings) -> Vec<ToolAvailability> {
    Tool::ALL
        .into_iter()
        .map(|tool| {
            let program = match tool {
                Tool::Unzip => &programs.unzip,
                Tool::Tar => &programs.tar,
                Tool::Hdiutil => &programs.hdiutil,
                Tool::Pkgutil => &programs.pkgutil,
                Tool::Codesign => &programs.codesign,
            };
            let location = match which::which(program) {
                Ok(path) => {
                    log::debug!("Found {} at: {}", tool, path.display());
                    Some(path)
                }
                Err(e) => {
                    log::debug!("{} ({}) not found: {}", tool, program, e);
                    None
                }
            };
            ToolAvailability {
                tool,
                program: program.clone(),
                location,
            }
        })
        .collect()
}
