//! Tool adapter backed by real subprocesses.

use super::{Tool, ToolAdapter, ToolOutput};
use crate::pipeline::error::{Error, Result};
use crate::pipeline::settings::{Settings, ToolSettings};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Runs tools with `tokio::process`, bounded by a per-invocation timeout.
///
/// A child that outlives the timeout is killed (the command is spawned with
/// `kill_on_drop`) and the call fails with [`Error::ToolTimeout`].
#[derive(Clone, Debug)]
pub struct SystemTools {
    programs: ToolSettings,
    timeout: Duration,
}

impl SystemTools {
    /// Creates an adapter using the program names and timeout from `settings`.
    pub fn new(settings: &Settings) -> Self {
        Self {
            programs: settings.tools().clone(),
            timeout: settings.tool_timeout(),
        }
    }

    /// Program name or path configured for `tool`.
    pub fn program(&self, tool: Tool) -> &str {
        match tool {
            Tool::Unzip => &self.programs.unzip,
            Tool::Tar => &self.programs.tar,
            Tool::Hdiutil => &self.programs.hdiutil,
            Tool::Pkgutil => &self.programs.pkgutil,
            Tool::Codesign => &self.programs.codesign,
        }
    }
}

impl ToolAdapter for SystemTools {
    async fn run(&self, tool: Tool, args: &[String]) -> Result<ToolOutput> {
        let program = self.program(tool);
        log::debug!("Running {} {}", program, args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => {
                let output = ToolOutput::from(output);
                if !output.success() {
                    log::debug!(
                        "{} exited with {:?}: {}",
                        tool,
                        output.exit_code,
                        output.stderr_lossy().trim()
                    );
                }
                Ok(output)
            }
            Ok(Err(source)) => Err(Error::ToolSpawn {
                tool: tool.name().to_string(),
                source,
            }),
            Err(_elapsed) => {
                log::warn!(
                    "{} timed out after {}s, terminating",
                    tool,
                    self.timeout.as_secs()
                );
                Err(Error::ToolTimeout {
                    tool: tool.name().to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::pipeline::settings::SettingsBuilder;

    fn tools_with(program: &str, timeout_secs: u64) -> SystemTools {
        let settings = SettingsBuilder::new()
            .tool_timeout_secs(timeout_secs)
            .tools(ToolSettings {
                tar: program.to_string(),
                ..Default::default()
            })
            .build()
            .unwrap();
        SystemTools::new(&settings)
    }

    #[tokio::test]
    async fn captures_exit_code_and_output() {
        let tools = tools_with("sh", 10);
        let output = tools
            .run(
                Tool::Tar,
                &["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout_lossy().trim(), "out");
        assert_eq!(output.stderr_lossy().trim(), "err");
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let tools = tools_with("sleep", 1);
        let err = tools.run(Tool::Tar, &["5".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::ToolTimeout { ref tool, .. } if tool == "tar"));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let tools = tools_with("/nonexistent/label-intake-tool", 10);
        let err = tools.run(Tool::Tar, &[]).await.unwrap_err();
        assert!(matches!(err, Error::ToolSpawn { .. }));
    }
}
