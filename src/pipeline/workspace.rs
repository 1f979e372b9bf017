//! Per-resolution scratch directory and disk-image mount tracking.
//!
//! A [`Workspace`] is allocated when a resolution starts and is destroyed only
//! by [`Workspace::finalize`]. Between those two points it records the single
//! disk image mount that may be active, so every exit path can detach it.

use crate::pipeline::error::{Error, ErrorExt, Result};
use crate::pipeline::settings::Settings;
use crate::pipeline::tools::{Tool, ToolAdapter, commands};
use crate::pipeline::utils::fs;
use std::fmt;
use std::path::{Path, PathBuf};

/// How the caller ends a resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizeMode {
    /// The user accepted the reviewed identity.
    Commit,
    /// The user abandoned the review, or the resolution failed.
    Cancel,
}

impl fmt::Display for FinalizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeMode::Commit => f.write_str("commit"),
            FinalizeMode::Cancel => f.write_str("cancel"),
        }
    }
}

/// Scratch directory owned by exactly one in-flight resolution.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    active_mount: Option<PathBuf>,
    next_id: u32,
    finalized: bool,
}

impl Workspace {
    /// Creates a uniquely named directory under the configured temp root.
    pub async fn allocate(settings: &Settings) -> Result<Self> {
        let root = settings.temp_root().join(format!(
            "{}-{}",
            settings.workspace_prefix(),
            uuid::Uuid::new_v4()
        ));
        tokio::fs::create_dir_all(&root)
            .await
            .fs_context("creating workspace", &root)?;
        log::debug!("Allocated workspace {}", root.display());

        Ok(Self {
            root,
            active_mount: None,
            next_id: 0,
            finalized: false,
        })
    }

    /// Workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mount point of the currently attached image, if any.
    pub fn active_mount(&self) -> Option<&Path> {
        self.active_mount.as_deref()
    }

    /// Creates a fresh, empty subdirectory named `<label>-<n>`.
    pub async fn scratch_dir(&mut self, label: &str) -> Result<PathBuf> {
        let dir = self.unique_path(label);
        tokio::fs::create_dir_all(&dir)
            .await
            .fs_context("creating scratch directory", &dir)?;
        Ok(dir)
    }

    /// Returns a not-yet-used path `<label>-<n>` inside the workspace.
    pub fn unique_path(&mut self, label: &str) -> PathBuf {
        self.next_id += 1;
        self.root.join(format!("{}-{}", label, self.next_id))
    }

    /// Attaches `image` at a fresh mount point inside the workspace.
    ///
    /// Refuses while another image is attached. When the attach tool times out
    /// or cannot be waited on, the mount point is still recorded so that the
    /// next [`detach`](Self::detach) tries to release whatever was mounted.
    pub async fn attach<T: ToolAdapter>(&mut self, tools: &T, image: &Path) -> Result<PathBuf> {
        if let Some(mounted) = &self.active_mount {
            return Err(Error::Mount(format!(
                "cannot attach {}: {} is still attached",
                image.display(),
                mounted.display()
            )));
        }

        let mount_point = self.scratch_dir("mnt").await?;
        let args = commands::attach(image, &mount_point)?;
        log::info!("Attaching {}", image.display());

        let output = match tools.run(Tool::Hdiutil, &args).await {
            Ok(output) => output,
            Err(e) => {
                self.active_mount = Some(mount_point);
                return Err(e);
            }
        };

        if !output.success() {
            return Err(Error::Mount(format!(
                "attaching {} failed with status {}: {}",
                image.display(),
                output.exit_code.unwrap_or(-1),
                output.stderr_lossy().trim()
            )));
        }

        log::debug!("Attached at {}", mount_point.display());
        self.active_mount = Some(mount_point.clone());
        Ok(mount_point)
    }

    /// Detaches the active mount. A no-op when nothing is attached.
    ///
    /// On failure the mount point stays recorded so a later call can retry.
    pub async fn detach<T: ToolAdapter>(&mut self, tools: &T) -> Result<()> {
        let Some(mount_point) = self.active_mount.clone() else {
            return Ok(());
        };

        log::debug!("Detaching {}", mount_point.display());
        let args = commands::detach(&mount_point)?;
        let output = tools.run(Tool::Hdiutil, &args).await?;

        if !output.success() {
            log::warn!(
                "Detaching {} had issues: {}",
                mount_point.display(),
                output.stderr_lossy().trim()
            );
            return Err(Error::Mount(format!(
                "detaching {} failed with status {}",
                mount_point.display(),
                output.exit_code.unwrap_or(-1)
            )));
        }

        self.active_mount = None;
        Ok(())
    }

    /// Detaches, then removes the workspace directory.
    ///
    /// If the image cannot be detached the directory is left in place, since
    /// removing it would recurse into the live volume.
    pub async fn finalize<T: ToolAdapter>(mut self, tools: &T, mode: FinalizeMode) -> Result<()> {
        if let Err(e) = self.detach(tools).await {
            log::warn!(
                "Leaving workspace {} in place: {}",
                self.root.display(),
                e
            );
            return Err(e);
        }

        fs::remove_dir_all(&self.root).await?;
        self.finalized = true;
        log::info!("Workspace {} released ({})", self.root.display(), mode);
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.finalized {
            log::warn!(
                "Workspace {} dropped without finalize{}",
                self.root.display(),
                if self.active_mount.is_some() {
                    " while an image is attached"
                } else {
                    ""
                }
            );
        }
    }
}
