//! Subprocess tool adapter.
//!
//! Every external utility the pipeline needs (`unzip`, `tar`, `hdiutil`,
//! `pkgutil`, `codesign`) is invoked through the [`ToolAdapter`] trait, so the
//! resolver and workspace code can be exercised with a fake adapter in tests.
//!
//! - [`commands`] - exact argument shapes for each invocation
//! - [`detection`] - `PATH` availability checks
//! - [`process`] - the real adapter backed by `tokio::process`

pub mod commands;
mod detection;
mod process;

pub use detection::{ToolAvailability, check_tools};
pub use process::SystemTools;

use crate::pipeline::error::{Error, Result};
use std::fmt;
use std::future::Future;

/// External utilities the pipeline shells out to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Zip extractor
    Unzip,
    /// Tar extractor
    Tar,
    /// Disk image attach/detach/convert/imageinfo
    Hdiutil,
    /// Installer package expansion and signature checks
    Pkgutil,
    /// Code signature verification and display
    Codesign,
}

impl Tool {
    /// All tools, in the order they are usually needed.
    pub const ALL: [Tool; 5] = [
        Tool::Unzip,
        Tool::Tar,
        Tool::Hdiutil,
        Tool::Pkgutil,
        Tool::Codesign,
    ];

    /// Canonical tool name, used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Unzip => "unzip",
            Tool::Tar => "tar",
            Tool::Hdiutil => "hdiutil",
            Tool::Pkgutil => "pkgutil",
            Tool::Codesign => "codesign",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exit status and captured output of one tool invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Output of a successful run with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Output of a failed run with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the tool exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Standard output, lossily decoded.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error, lossily decoded.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Converts a non-zero exit into [`Error::ToolExecution`].
    pub fn check(self, tool: Tool) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(Error::ToolExecution {
            tool: tool.name().to_string(),
            exit_code: self.exit_code.unwrap_or(-1),
            stderr: self.stderr_lossy().trim().to_string(),
        })
    }
}

impl From<std::process::Output> for ToolOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs external tools on behalf of the pipeline.
///
/// Implementations must not interpret the exit status; callers decide whether a
/// non-zero exit is fatal (see [`ToolOutput::check`]).
pub trait ToolAdapter: Send + Sync + 'static {
    /// Runs `tool` with `args` and captures its exit status and output.
    fn run(&self, tool: Tool, args: &[String]) -> impl Future<Output = Result<ToolOutput>> + Send;
}

/// Runs a tool and fails with [`Error::ToolExecution`] on a non-zero exit.
pub async fn run_checked<T: ToolAdapter>(
    tools: &T,
    tool: Tool,
    args: &[String],
) -> Result<ToolOutput> {
    tools.run(tool, args).await?.check(tool)
}
