//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap, with the
//! cross-argument checks clap cannot express.

use crate::pipeline::DeclaredType;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Resolves vendor downloads to reviewable installer identities
#[derive(Parser, Debug)]
#[command(
    name = "label_intake",
    version,
    about = "Resolves vendor downloads to reviewable installer identities",
    long_about = "Downloads a vendor artifact, unwraps it according to its declared container type \
and prints the identity and signature of the installer package or app bundle inside.

Usage:
  label_intake resolve --type packageInZip --url https://vendor.example/agent.zip
  label_intake resolve --type diskImage --path ./Tool.dmg --output ./artifacts
  label_intake tools

Exit code 0 = an identity review was produced."
)]
pub struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Only print the review and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print each stage as it starts
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download or read an artifact and print its identity review
    Resolve(ResolveArgs),
    /// Report which platform tools are available
    Tools {
        /// Configuration file with tool overrides
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

/// Arguments of `resolve`
#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["url", "path"])))]
pub struct ResolveArgs {
    /// Declared container type: package, packageInZip, packageInImage,
    /// packageInImageInZip, diskImage, zip, compressedTar, appInImageInZip
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub declared_type: DeclaredType,

    /// Download URL (http or https)
    #[arg(short, long, value_name = "URL")]
    pub url: Option<String>,

    /// Already downloaded file
    #[arg(short, long, value_name = "FILE")]
    pub path: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory to copy the artifact into; the review is then committed
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the review as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl ResolveArgs {
    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err("URL cannot be empty".to_string());
        }
        if let Some(output) = self.output.as_deref().filter(|o| o.is_file()) {
            return Err(format!(
                "Output path {} is a file, expected a directory",
                output.display()
            ));
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("label_intake").chain(argv.iter().copied()))
    }

    #[test]
    fn resolve_parses_declared_type() {
        let args = parse(&["resolve", "--type", "packageInImageInZip", "--url", "https://x/a.zip"]).unwrap();
        let Command::Resolve(resolve) = args.command else {
            panic!("expected resolve");
        };
        assert_eq!(resolve.declared_type, DeclaredType::PackageInImageInZip);
        assert!(resolve.validate().is_ok());
    }

    #[test]
    fn url_and_path_are_exclusive() {
        assert!(parse(&["resolve", "-t", "zip", "--url", "https://x/a", "--path", "a.zip"]).is_err());
        assert!(parse(&["resolve", "-t", "zip"]).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(parse(&["resolve", "--type", "msi", "--path", "a.msi"]).is_err());
    }

    #[test]
    fn blank_url_fails_validation() {
        let args = parse(&["resolve", "-t", "package", "--url", " "]).unwrap();
        let Command::Resolve(resolve) = args.command else {
            panic!("expected resolve");
        };
        assert!(resolve.validate().is_err());
    }
}
