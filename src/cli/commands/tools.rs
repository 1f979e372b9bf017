//! Platform tool availability report.

use crate::cli::RuntimeConfig;
use crate::error::Result;
use crate::pipeline::Settings;
use crate::pipeline::tools::{ToolAvailability, check_tools};

/// Warns about every configured tool that cannot be found on `PATH`.
///
/// Returns the number of missing tools.
pub fn warn_missing_tools(settings: &Settings, runtime_config: &RuntimeConfig) -> Result<usize> {
    let missing: Vec<ToolAvailability> = check_tools(settings.tools())
        .into_iter()
        .filter(|t| !t.is_available())
        .collect();

    for tool in &missing {
        runtime_config.output().warn(&format!(
            "{} not found (looked for `{}`)",
            tool.tool, tool.program
        ))?;
    }
    Ok(missing.len())
}

/// Prints where each tool resolves; exit code 1 when any is missing.
pub fn report_tools(settings: &Settings, runtime_config: &RuntimeConfig) -> Result<i32> {
    let output = runtime_config.output();
    let mut missing = 0;

    for availability in check_tools(settings.tools()) {
        match &availability.location {
            Some(location) => output.result(&format!(
                "{:<9} {}",
                availability.tool.name(),
                location.display()
            ))?,
            None => {
                missing += 1;
                output.result(&format!(
                    "{:<9} missing ({})",
                    availability.tool.name(),
                    availability.program
                ))?;
            }
        }
    }

    Ok(if missing == 0 { 0 } else { 1 })
}
