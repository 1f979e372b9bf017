//! HTTP transfer of the vendor artifact.
//!
//! The body is streamed into a transient file under the temp root while
//! [`DownloadProgress`] is reported at most once per configured interval (plus
//! a first and a final report). The transient file is moved into the
//! workspace afterwards and never reused.

mod filename;

pub use filename::{from_content_disposition, from_url, suggested_file_name};

use crate::pipeline::error::{DownloadError, Error, ErrorExt, Result};
use crate::pipeline::settings::Settings;
use crate::pipeline::utils::fs;
use crate::pipeline::workspace::Workspace;
use futures_lite::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Transfer progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// Bytes written to disk so far
    pub bytes_written: u64,
    /// Total size announced by the server, if any
    pub bytes_expected: Option<u64>,
}

impl DownloadProgress {
    /// Completed fraction in `0.0..=1.0`, `None` while indeterminate.
    pub fn fraction(&self) -> Option<f64> {
        match self.bytes_expected {
            Some(0) | None => None,
            Some(total) => Some((self.bytes_written as f64 / total as f64).min(1.0)),
        }
    }
}

/// Parses `raw` and requires an `http` or `https` scheme.
pub fn validate_url(raw: &str) -> std::result::Result<Url, DownloadError> {
    let invalid = |reason: String| DownloadError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

/// A completed transfer waiting to be moved into a workspace.
#[derive(Debug)]
pub struct DownloadedFile {
    location: TempPath,
    suggested_file_name: String,
    bytes: u64,
}

impl DownloadedFile {
    /// Transient location of the body.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Name chosen from the response headers or URL.
    pub fn suggested_file_name(&self) -> &str {
        &self.suggested_file_name
    }

    /// Bytes received.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    /// Whether the body was empty.
    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// Moves the file into a fresh `download-<n>` directory of `workspace`.
    pub async fn into_workspace(self, workspace: &mut Workspace) -> Result<PathBuf> {
        let dest = workspace
            .scratch_dir("download")
            .await?
            .join(&self.suggested_file_name);
        fs::move_file(&self.location, &dest).await?;
        log::debug!("Moved download to {}", dest.display());
        Ok(dest)
    }
}

/// Streams HTTP bodies to transient files.
#[derive(Clone, Debug)]
pub struct Downloader {
    client: reqwest::Client,
    temp_root: PathBuf,
    fallback_file_name: String,
    progress_interval: Duration,
}

impl Downloader {
    /// Builds the HTTP client from `settings`.
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(settings.user_agent());
        if let Some(timeout) = settings.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(DownloadError::Transport)?;

        Ok(Self {
            client,
            temp_root: settings.temp_root().to_path_buf(),
            fallback_file_name: settings.fallback_file_name().to_string(),
            progress_interval: settings.progress_interval(),
        })
    }

    /// Downloads `url`, calling `on_progress` as bytes arrive.
    ///
    /// Returns [`Error::Cancelled`] as soon as `cancel` fires; the transient
    /// file is removed in that case and on every other error.
    pub async fn download<F>(
        &self,
        url: &Url,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<DownloadedFile>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        log::info!("Downloading {}", url);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(url.clone()).send() => response.map_err(DownloadError::Transport)?,
        };

        let status = response.status();
        if !status.is_success() {
            log::warn!("{} answered HTTP {}", response.url(), status);
            return Err(DownloadError::HttpStatus(status.as_u16()).into());
        }

        let bytes_expected = response.content_length();
        let disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok());
        let suggested_file_name =
            suggested_file_name(disposition, response.url(), &self.fallback_file_name);
        log::debug!(
            "Saving as {} ({} bytes expected)",
            suggested_file_name,
            bytes_expected.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        tokio::fs::create_dir_all(&self.temp_root)
            .await
            .fs_context("creating temp root", &self.temp_root)?;
        let (file, location) = tempfile::Builder::new()
            .prefix("download-")
            .tempfile_in(&self.temp_root)
            .fs_context("creating transient download file", &self.temp_root)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut progress = DownloadProgress {
            bytes_written: 0,
            bytes_expected,
        };
        on_progress(progress);
        let mut last_report = Instant::now();

        let mut body = std::pin::pin!(response.bytes_stream());
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(DownloadError::Transport)?;

            file.write_all(&chunk)
                .await
                .fs_context("writing download", &location)?;
            progress.bytes_written += chunk.len() as u64;

            if last_report.elapsed() >= self.progress_interval {
                on_progress(progress);
                last_report = Instant::now();
            }
        }

        file.flush().await.fs_context("flushing download", &location)?;
        drop(file);
        on_progress(progress);

        log::info!("Downloaded {} bytes", progress.bytes_written);
        Ok(DownloadedFile {
            location,
            suggested_file_name,
            bytes: progress.bytes_written,
        })
    }
}
