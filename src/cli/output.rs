//! Terminal output: status lines on stderr, results on stdout.

use crate::pipeline::{DownloadProgress, ReviewSummary, Stage};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

/// Writes user-facing messages, honoring `--quiet` and `--verbose`.
#[derive(Debug, Clone)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Creates a manager; `quiet` wins over `verbose`.
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose: verbose && !quiet,
            quiet,
        }
    }

    /// Whether status output is suppressed.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Message shown only with `--verbose`.
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if self.verbose {
            writeln!(io::stderr(), "{message}")?;
        }
        Ok(())
    }

    /// Status message.
    pub fn progress(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stderr(), "{message}")?;
        }
        Ok(())
    }

    /// Success message.
    pub fn success(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(io::stderr(), "✓ {message}")?;
        }
        Ok(())
    }

    /// Warning, printed even when quiet.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        writeln!(io::stderr(), "warning: {message}")
    }

    /// Stage transition.
    pub fn stage(&self, stage: Stage) -> io::Result<()> {
        self.verbose(&format!("==> {stage}"))
    }

    /// Result line on stdout.
    pub fn result(&self, message: &str) -> io::Result<()> {
        writeln!(io::stdout(), "{message}")
    }

    /// Bar for a download; a spinner when the size is unknown.
    pub fn download_bar(&self, first: &DownloadProgress) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let bar = match first.bytes_expected {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
                        .map(|style| style.progress_chars("#>-"))
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {bytes} ({bytes_per_sec}) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        bar.set_message("Downloading");
        bar.set_position(first.bytes_written);
        bar
    }

    /// Human-readable identity review on stdout.
    pub fn review(&self, summary: &ReviewSummary) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Declared type: {}", summary.declared_type)?;
        writeln!(
            out,
            "Artifact:      {} ({})",
            summary.artifact.path.display(),
            summary.artifact.kind
        )?;
        writeln!(out, "SHA-256:       {}", summary.sha256)?;

        if summary.candidates.is_empty() {
            writeln!(out, "Identity:      none found")?;
        } else {
            writeln!(out, "Identity:")?;
            for candidate in &summary.candidates {
                match &candidate.minimum_os {
                    Some(min) => writeln!(
                        out,
                        "  {} {} (macOS {}+)",
                        candidate.identifier, candidate.version, min
                    )?,
                    None => writeln!(out, "  {} {}", candidate.identifier, candidate.version)?,
                }
            }
        }

        let signature = &summary.signature;
        writeln!(
            out,
            "Signature:     {}, {} ({})",
            if signature.accepted { "accepted" } else { "not accepted" },
            signature.developer_id,
            signature.developer_team
        )
    }
}
