//! Default inspector backed by `Info.plist`, `pkgutil` and `codesign`.

use super::package_info::{parse_distribution_minimum_os, parse_package_info};
use super::signature::{parse_codesign_details, parse_pkgutil_signature};
use super::{IdentityCandidate, IdentityInspector, SignatureVerdict};
use crate::pipeline::error::{Error, ErrorExt, Result};
use crate::pipeline::resolver::{ArtifactKind, TerminalArtifact};
use crate::pipeline::settings::Settings;
use crate::pipeline::tools::{Tool, ToolAdapter, commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inspector that runs the platform tools through a [`ToolAdapter`].
pub struct SystemInspector<T: ToolAdapter> {
    tools: Arc<T>,
    scratch_root: PathBuf,
}

impl<T: ToolAdapter> SystemInspector<T> {
    /// Package expansions go to short-lived directories under the temp root.
    pub fn new(tools: Arc<T>, settings: &Settings) -> Self {
        Self {
            tools,
            scratch_root: settings.temp_root().to_path_buf(),
        }
    }

    async fn expand_package(&self, path: &Path) -> Result<Vec<IdentityCandidate>> {
        let scratch = tempfile::Builder::new()
            .prefix("pkg-expand-")
            .tempdir_in(&self.scratch_root)
            .fs_context("creating expansion directory", &self.scratch_root)?;
        // pkgutil refuses to expand into an existing directory
        let dest = scratch.path().join("expanded");

        let output = self
            .tools
            .run(Tool::Pkgutil, &commands::pkg_expand(path, &dest)?)
            .await?;
        if !output.success() {
            return Err(Error::Inspection(format!(
                "expanding {} failed: {}",
                path.display(),
                output.stderr_lossy().trim()
            )));
        }

        let candidates = tokio::task::spawn_blocking(move || collect_package_identities(&dest))
            .await
            .map_err(|e| Error::GenericError(format!("Package scan task panicked: {e}")))??;
        drop(scratch);
        Ok(candidates)
    }
}

/// Reads every `PackageInfo` below an expanded package, in name order.
fn collect_package_identities(root: &Path) -> Result<Vec<IdentityCandidate>> {
    let mut candidates: Vec<IdentityCandidate> = Vec::new();
    let mut minimum_os = None;

    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name == "Distribution" && entry.depth() == 1 {
            let xml = std::fs::read_to_string(entry.path())
                .fs_context("reading Distribution", entry.path())?;
            minimum_os = parse_distribution_minimum_os(&xml);
        } else if name == "PackageInfo" {
            let xml = std::fs::read_to_string(entry.path())
                .fs_context("reading PackageInfo", entry.path())?;
            match parse_package_info(&xml) {
                Some(candidate) if !candidates.contains(&candidate) => candidates.push(candidate),
                Some(_) => {}
                None => log::debug!("No identifier in {}", entry.path().display()),
            }
        }
    }

    for candidate in &mut candidates {
        candidate.minimum_os = minimum_os.clone();
    }
    Ok(candidates)
}

/// Reads the bundle identity from `Contents/Info.plist`.
///
/// A bundle without `CFBundleIdentifier` yields no candidate.
async fn read_bundle_identity(bundle: &Path) -> Result<Option<IdentityCandidate>> {
    let info_plist = bundle.join("Contents").join("Info.plist");
    if !tokio::fs::try_exists(&info_plist).await.unwrap_or(false) {
        return Err(Error::Inspection(format!(
            "{} has no Contents/Info.plist",
            bundle.display()
        )));
    }

    let value = tokio::task::spawn_blocking(move || plist::Value::from_file(&info_plist))
        .await
        .map_err(|e| Error::GenericError(format!("Info.plist read task panicked: {e}")))??;

    let Some(dict) = value.as_dictionary() else {
        return Err(Error::Inspection(format!(
            "Info.plist of {} is not a dictionary",
            bundle.display()
        )));
    };
    let string = |key: &str| dict.get(key).and_then(|v| v.as_string()).map(str::to_string);

    let Some(identifier) = string("CFBundleIdentifier") else {
        log::debug!("{} has no CFBundleIdentifier", bundle.display());
        return Ok(None);
    };

    Ok(Some(IdentityCandidate {
        identifier,
        version: string("CFBundleShortVersionString")
            .or_else(|| string("CFBundleVersion"))
            .unwrap_or_default(),
        minimum_os: string("LSMinimumSystemVersion"),
    }))
}

impl<T: ToolAdapter> IdentityInspector for SystemInspector<T> {
    async fn inspect_package(&self, path: &Path) -> Result<Vec<IdentityCandidate>> {
        // Bundle-style packages are directories with their own Info.plist
        if path.is_dir() {
            return Ok(read_bundle_identity(path).await?.into_iter().collect());
        }
        self.expand_package(path).await
    }

    async fn inspect_app(&self, path: &Path) -> Result<Vec<IdentityCandidate>> {
        Ok(read_bundle_identity(path).await?.into_iter().collect())
    }

    async fn inspect_signature(&self, artifact: &TerminalArtifact) -> Result<SignatureVerdict> {
        let path = &artifact.path;
        match artifact.kind {
            ArtifactKind::Package => {
                let output = self
                    .tools
                    .run(Tool::Pkgutil, &commands::pkg_check_signature(path)?)
                    .await?;
                Ok(parse_pkgutil_signature(output.success(), &output.stdout_lossy()))
            }
            ArtifactKind::AppBundle => {
                let verify = self
                    .tools
                    .run(Tool::Codesign, &commands::codesign_verify(path)?)
                    .await?;
                if !verify.success() {
                    log::info!(
                        "codesign rejected {}: {}",
                        path.display(),
                        verify.stderr_lossy().trim()
                    );
                }
                let details = self
                    .tools
                    .run(Tool::Codesign, &commands::codesign_display(path)?)
                    .await?;
                // codesign prints its display output on stderr
                Ok(parse_codesign_details(verify.success(), &details.stderr_lossy()))
            }
            ArtifactKind::DiskImage => Err(Error::Inspection(format!(
                "no signature check for disk image {}",
                path.display()
            ))),
        }
    }
}
