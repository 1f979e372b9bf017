//! Declared container types and resolution results.

use crate::pipeline::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Container type declared for a download. Fixes which unwrap steps apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclaredType {
    /// Bare installer package
    Package,
    /// Installer package somewhere inside a zip archive
    PackageInZip,
    /// Installer package at the root of a disk image
    PackageInImage,
    /// Disk image inside a zip, with an installer package at its root
    PackageInImageInZip,
    /// Disk image with an app bundle at its root
    DiskImage,
    /// Zip archive with an app bundle at its top level
    Zip,
    /// Tar archive with an app bundle at its top level
    CompressedTar,
    /// Disk image inside a zip, with an app bundle at its root
    AppInImageInZip,
}

impl DeclaredType {
    /// Every declared type.
    pub const ALL: [DeclaredType; 8] = [
        DeclaredType::Package,
        DeclaredType::PackageInZip,
        DeclaredType::PackageInImage,
        DeclaredType::PackageInImageInZip,
        DeclaredType::DiskImage,
        DeclaredType::Zip,
        DeclaredType::CompressedTar,
        DeclaredType::AppInImageInZip,
    ];

    /// Label name of the type, as used in label definitions.
    pub fn as_str(self) -> &'static str {
        match self {
            DeclaredType::Package => "package",
            DeclaredType::PackageInZip => "packageInZip",
            DeclaredType::PackageInImage => "packageInImage",
            DeclaredType::PackageInImageInZip => "packageInImageInZip",
            DeclaredType::DiskImage => "diskImage",
            DeclaredType::Zip => "zip",
            DeclaredType::CompressedTar => "compressedTar",
            DeclaredType::AppInImageInZip => "appInImageInZip",
        }
    }

    /// Kind of artifact a successful resolution of this type produces.
    pub fn terminal_kind(self) -> ArtifactKind {
        match self {
            DeclaredType::Package
            | DeclaredType::PackageInZip
            | DeclaredType::PackageInImage
            | DeclaredType::PackageInImageInZip => ArtifactKind::Package,
            DeclaredType::DiskImage
            | DeclaredType::Zip
            | DeclaredType::CompressedTar
            | DeclaredType::AppInImageInZip => ArtifactKind::AppBundle,
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeclaredType {
    type Err = String;

    /// Accepts label names case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown type `{}`, expected one of: {}",
                    s,
                    Self::ALL.map(DeclaredType::as_str).join(", ")
                )
            })
    }
}

/// Kinds of artifacts the locate steps look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    /// `.pkg` / `.mpkg`
    Package,
    /// `.app` directory
    AppBundle,
    /// `.dmg`
    DiskImage,
}

impl ArtifactKind {
    /// File extensions that identify this kind, lowercase.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ArtifactKind::Package => &["pkg", "mpkg"],
            ArtifactKind::AppBundle => &["app"],
            ArtifactKind::DiskImage => &["dmg"],
        }
    }

    /// Whether `path` has one of this kind's extensions.
    pub fn matches_extension(self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Package => f.write_str("installer package"),
            ArtifactKind::AppBundle => f.write_str("app bundle"),
            ArtifactKind::DiskImage => f.write_str("disk image"),
        }
    }
}

/// Innermost package or app bundle a resolution produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalArtifact {
    /// Package or app bundle
    pub kind: ArtifactKind,
    /// Location inside the workspace
    pub path: PathBuf,
}

/// Input of one resolution. Immutable once resolution starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionRequest {
    declared_type: DeclaredType,
    source: PathBuf,
    workspace_root: PathBuf,
}

impl ResolutionRequest {
    /// Creates a request for `source` resolved inside `workspace`.
    pub fn new(declared_type: DeclaredType, source: impl Into<PathBuf>, workspace: &Workspace) -> Self {
        Self {
            declared_type,
            source: source.into(),
            workspace_root: workspace.root().to_path_buf(),
        }
    }

    /// Declared container type.
    pub fn declared_type(&self) -> DeclaredType {
        self.declared_type
    }

    /// Initial file location.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Root of the workspace the request was created for.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}
