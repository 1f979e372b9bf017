//! Container resolution state machine.
//!
//! The declared type fixes a short plan of unwrap steps (see [`plan`]). The
//! [`Resolver`] runs them strictly in sequence, each step's output being the
//! next step's input, until a terminal artifact is reached or a step fails:
//!
//! ```text
//! Idle -> Unwrapping(depth) -> Unwrapping(depth + 1) | Terminal | Failed
//! ```
//!
//! Disk image steps attach, copy the artifact out of the volume and detach
//! before returning, on success and failure alike.

mod search;
mod types;

pub use search::{find_recursive, find_top_level};
pub use types::{ArtifactKind, DeclaredType, ResolutionRequest, TerminalArtifact};

use crate::bail;
use crate::pipeline::dmg;
use crate::pipeline::error::{Error, Result};
use crate::pipeline::settings::Settings;
use crate::pipeline::tools::{Tool, ToolAdapter, commands, run_checked};
use crate::pipeline::utils::fs;
use crate::pipeline::workspace::Workspace;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// One unwrap step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Extract the current zip archive
    ExtractZip,
    /// Extract the current tar archive
    ExtractTar,
    /// First package anywhere in the current directory tree
    FindPackageRecursive,
    /// First disk image at the top of the current directory
    FindDiskImage,
    /// First app bundle at the top of the current directory
    FindAppBundle,
    /// Normalize, attach, copy out the first root-level package, detach
    PackageFromImage,
    /// Attach, copy out the first root-level app bundle, detach
    AppFromImage,
}

impl Step {
    /// Whether the step strips a container layer.
    fn unwraps(self) -> bool {
        matches!(
            self,
            Step::ExtractZip | Step::ExtractTar | Step::PackageFromImage | Step::AppFromImage
        )
    }
}

/// Unwrap steps for a declared type, in order.
pub fn plan(declared: DeclaredType) -> &'static [Step] {
    use Step::*;
    match declared {
        DeclaredType::Package => &[],
        DeclaredType::PackageInZip => &[ExtractZip, FindPackageRecursive],
        DeclaredType::PackageInImage => &[PackageFromImage],
        DeclaredType::PackageInImageInZip => &[ExtractZip, FindDiskImage, PackageFromImage],
        DeclaredType::DiskImage => &[AppFromImage],
        DeclaredType::Zip => &[ExtractZip, FindAppBundle],
        DeclaredType::CompressedTar => &[ExtractTar, FindAppBundle],
        DeclaredType::AppInImageInZip => &[ExtractZip, FindDiskImage, AppFromImage],
    }
}

/// Resolver state, recorded at every transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveState {
    /// Nothing done yet
    Idle,
    /// Running steps; `depth` counts container layers stripped so far
    Unwrapping {
        /// Layers stripped
        depth: usize,
        /// Step about to run
        step: Step,
    },
    /// Resolution produced its artifact
    Terminal(TerminalArtifact),
    /// Resolution failed
    Failed,
}

/// Drives the unwrap plan for one request.
pub struct Resolver<'a, T: ToolAdapter> {
    tools: &'a T,
    settings: &'a Settings,
    cancel: Option<CancellationToken>,
}

impl<'a, T: ToolAdapter> Resolver<'a, T> {
    /// Creates a resolver using `tools` for every subprocess.
    pub fn new(tools: &'a T, settings: &'a Settings) -> Self {
        Self {
            tools,
            settings,
            cancel: None,
        }
    }

    /// Checks `token` between steps and stops with [`Error::Cancelled`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolves `request` to exactly one terminal artifact or one error.
    pub async fn resolve(
        &self,
        request: &ResolutionRequest,
        workspace: &mut Workspace,
    ) -> Result<TerminalArtifact> {
        self.resolve_traced(request, workspace).await.0
    }

    /// Like [`resolve`](Self::resolve), also returning every state visited.
    pub async fn resolve_traced(
        &self,
        request: &ResolutionRequest,
        workspace: &mut Workspace,
    ) -> (Result<TerminalArtifact>, Vec<ResolveState>) {
        let mut trace = vec![ResolveState::Idle];
        let result = self.run_plan(request, workspace, &mut trace).await;

        match &result {
            Ok(artifact) => {
                log::info!("Resolved {} to {}", request.declared_type(), artifact.path.display());
                trace.push(ResolveState::Terminal(artifact.clone()));
            }
            Err(e) => {
                log::warn!("Resolving {} failed: {}", request.declared_type(), e);
                trace.push(ResolveState::Failed);
            }
        }

        (result, trace)
    }

    async fn run_plan(
        &self,
        request: &ResolutionRequest,
        workspace: &mut Workspace,
        trace: &mut Vec<ResolveState>,
    ) -> Result<TerminalArtifact> {
        if request.workspace_root() != workspace.root() {
            bail!(
                "request was created for workspace {}, not {}",
                request.workspace_root().display(),
                workspace.root().display()
            );
        }
        if !tokio::fs::try_exists(request.source()).await.unwrap_or(false) {
            bail!("source {} does not exist", request.source().display());
        }

        let declared = request.declared_type();
        let mut current = request.source().to_path_buf();
        let mut depth = 0;

        for &step in plan(declared) {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(Error::Cancelled);
            }

            trace.push(ResolveState::Unwrapping { depth, step });
            log::debug!("{} step {:?} on {}", declared, step, current.display());

            current = self.run_step(step, &current, workspace).await?;
            if step.unwraps() {
                depth += 1;
            }
        }

        Ok(TerminalArtifact {
            kind: declared.terminal_kind(),
            path: current,
        })
    }

    async fn run_step(&self, step: Step, current: &Path, workspace: &mut Workspace) -> Result<PathBuf> {
        match step {
            Step::ExtractZip => {
                let dest = workspace.scratch_dir("unzipped").await?;
                log::info!("Extracting {}", current.display());
                run_checked(self.tools, Tool::Unzip, &commands::unzip(current, &dest)?).await?;
                Ok(dest)
            }
            Step::ExtractTar => {
                let dest = workspace.scratch_dir("untarred").await?;
                log::info!("Extracting {}", current.display());
                run_checked(self.tools, Tool::Tar, &commands::untar(current, &dest)?).await?;
                Ok(dest)
            }
            Step::FindPackageRecursive => {
                let found =
                    find_recursive(current, ArtifactKind::Package, self.settings.search_depth())
                        .await?;
                require(found, ArtifactKind::Package, current)
            }
            Step::FindDiskImage => {
                let found = find_top_level(current, ArtifactKind::DiskImage).await?;
                require(found, ArtifactKind::DiskImage, current)
            }
            Step::FindAppBundle => {
                let found = find_top_level(current, ArtifactKind::AppBundle).await?;
                require(found, ArtifactKind::AppBundle, current)
            }
            Step::PackageFromImage => {
                self.copy_from_image(workspace, current, ArtifactKind::Package, true)
                    .await
            }
            Step::AppFromImage => {
                let normalize = self.settings.normalize_app_images();
                self.copy_from_image(workspace, current, ArtifactKind::AppBundle, normalize)
                    .await
            }
        }
    }

    /// Attaches `image`, copies the first root-level `kind` into the
    /// workspace and detaches, whatever the outcome of the copy.
    async fn copy_from_image(
        &self,
        workspace: &mut Workspace,
        image: &Path,
        kind: ArtifactKind,
        normalize: bool,
    ) -> Result<PathBuf> {
        let image = if normalize {
            dmg::normalize_if_needed(self.tools, workspace, image).await?
        } else {
            image.to_path_buf()
        };

        let mount_point = match workspace.attach(self.tools, &image).await {
            Ok(mount_point) => mount_point,
            Err(e) => {
                self.release_after_failure(workspace).await;
                return Err(e);
            }
        };

        let copied = self.copy_out(workspace, &mount_point, kind).await;

        match workspace.detach(self.tools).await {
            Ok(()) => copied,
            Err(detach_error) => match copied {
                Ok(_) => Err(detach_error),
                Err(e) => {
                    log::warn!("Detach after failed copy also failed: {}", detach_error);
                    Err(e)
                }
            },
        }
    }

    async fn copy_out(
        &self,
        workspace: &mut Workspace,
        mount_point: &Path,
        kind: ArtifactKind,
    ) -> Result<PathBuf> {
        let found = require(find_top_level(mount_point, kind).await?, kind, mount_point)?;
        let name = found
            .file_name()
            .ok_or_else(|| Error::GenericError(format!("invalid {kind} path")))?;

        let dest = workspace.scratch_dir("artifact").await?.join(name);
        log::info!("Copying {} out of the volume", found.display());
        fs::copy_path(&found, &dest).await?;
        Ok(dest)
    }

    async fn release_after_failure(&self, workspace: &mut Workspace) {
        if let Err(e) = workspace.detach(self.tools).await {
            log::warn!("Detach after failed attach also failed: {}", e);
        }
    }
}

fn require(found: Option<PathBuf>, expected: ArtifactKind, searched: &Path) -> Result<PathBuf> {
    found.ok_or_else(|| Error::MissingArtifact {
        expected,
        searched: searched.to_path_buf(),
    })
}
