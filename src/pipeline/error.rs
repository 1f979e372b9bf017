//! Error types for the resolution pipeline.
//!
//! Every failure that can abort a resolution is a variant of [`Error`]. The
//! variants follow the pipeline taxonomy: download failures, tool failures,
//! missing artifacts, mount and conversion failures, and inspection failures.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::resolver::ArtifactKind;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Download failures.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The URL could not be parsed or uses an unsupported scheme.
    #[error("invalid download URL `{url}`: {reason}")]
    InvalidUrl {
        /// URL as given by the caller
        url: String,
        /// Parser or validation message
        reason: String,
    },

    /// Connection, TLS, redirect or body-read failure.
    #[error("transfer failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server responded with HTTP {0}")]
    HttpStatus(u16),
}

/// Main error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transfer failed
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    /// An external tool exited with a non-zero status
    #[error("{tool} exited with status {exit_code}")]
    ToolExecution {
        /// Tool name (`unzip`, `tar`, `hdiutil`, ...)
        tool: String,
        /// Exit code, `-1` when terminated by a signal
        exit_code: i32,
        /// Captured stderr, trimmed
        stderr: String,
    },

    /// An external tool could not be started
    #[error("failed to start {tool}: {source}")]
    ToolSpawn {
        /// Tool name
        tool: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// An external tool ran past its deadline and was killed
    #[error("{tool} did not finish within {}s", timeout.as_secs())]
    ToolTimeout {
        /// Tool name
        tool: String,
        /// Deadline that expired
        timeout: Duration,
    },

    /// A locate step found nothing
    #[error("no {expected} found in {}", searched.display())]
    MissingArtifact {
        /// Kind of artifact the step looked for
        expected: ArtifactKind,
        /// Directory that was searched
        searched: PathBuf,
    },

    /// Attaching a disk image failed or was refused
    #[error("mount error: {0}")]
    Mount(String),

    /// License-agreement conversion failed
    #[error("disk image conversion failed: {0}")]
    Conversion(String),

    /// Identity inspection failed
    #[error("inspection failed: {0}")]
    Inspection(String),

    /// The caller cancelled the resolution
    #[error("resolution cancelled")]
    Cancelled,

    /// Filesystem error with the operation and path it happened on
    #[error("{context} ({}): {source}", path.display())]
    Fs {
        /// What was being done
        context: String,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Property list decoding errors
    #[error("property list error: {0}")]
    Plist(#[from] plist::Error),

    /// Directory walk errors
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Anything else, with a message
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Whether this error came from the download phase.
    pub fn is_download(&self) -> bool {
        matches!(self, Self::Download(_))
    }
}

/// Attaches filesystem context to IO results.
pub trait ErrorExt<T> {
    /// Wraps the error with an operation description and the path involved.
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context: context.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

/// Converts options and foreign errors into [`Error::GenericError`] with a message.
pub trait Context<T> {
    /// Adds a static message.
    fn context<C: Display>(self, context: C) -> Result<T>;

    /// Adds a lazily built message.
    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T>;
}

impl<T> Context<T> for Option<T> {
    fn context<C: Display>(self, context: C) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

impl<T> Context<T> for Result<T> {
    fn context<C: Display>(self, context: C) -> Result<T> {
        self.map_err(|e| Error::GenericError(format!("{context}: {e}")))
    }

    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::GenericError(format!("{}: {e}", f())))
    }
}

/// Returns early with an [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::pipeline::Error::GenericError(format!($($arg)*)))
    };
}

/// Returns the path as UTF-8, or an error naming what the path was for.
pub fn path_str<'a>(path: &'a Path, what: &str) -> Result<&'a str> {
    path.to_str().ok_or_else(|| {
        Error::GenericError(format!(
            "{what} path contains non-UTF8 characters: {}",
            path.display()
        ))
    })
}
