//! Locating artifacts inside extracted trees and mounted volumes.
//!
//! Entries are visited in file-name order so that "first match" is stable
//! across runs. Resource-fork debris from zip archives (`__MACOSX/`, `._*`)
//! is never matched.

use super::ArtifactKind;
use crate::pipeline::error::{Error, ErrorExt, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Directory zip tools create for resource forks.
const RESOURCE_FORK_DIR: &str = "__MACOSX";

fn is_debris(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name == RESOURCE_FORK_DIR || name.starts_with("._")
}

fn is_kind(path: &Path, is_dir: bool, kind: ArtifactKind) -> bool {
    if !kind.matches_extension(path) {
        return false;
    }
    match kind {
        ArtifactKind::AppBundle => is_dir,
        ArtifactKind::DiskImage => !is_dir,
        // Flat packages are files, legacy bundle packages are directories
        ArtifactKind::Package => true,
    }
}

/// Returns the first entry of `kind` directly inside `dir`.
pub async fn find_top_level(dir: &Path, kind: ArtifactKind) -> Result<Option<PathBuf>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .fs_context("listing directory", dir)?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .fs_context("listing directory", dir)?
    {
        names.push(entry.file_name());
    }
    names.sort();

    for name in names {
        if is_debris(&name) {
            continue;
        }
        let path = dir.join(&name);
        // Symlinks are followed here: volumes often link to /Applications
        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_kind(&path, is_dir, kind) {
            log::debug!("Found {} at {}", kind, path.display());
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Returns the first entry of `kind` anywhere below `dir`, at most
/// `max_depth` levels deep.
///
/// Symlinks are not followed, so a cyclic tree cannot loop the walk.
pub async fn find_recursive(
    dir: &Path,
    kind: ArtifactKind,
    max_depth: usize,
) -> Result<Option<PathBuf>> {
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let walker = walkdir::WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_debris(e.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if is_kind(entry.path(), entry.file_type().is_dir(), kind) {
                log::debug!(
                    "Found {} at depth {}: {}",
                    kind,
                    entry.depth(),
                    entry.path().display()
                );
                return Some(entry.into_path());
            }
        }
        None
    })
    .await
    .map_err(|e| Error::GenericError(format!("Search task panicked: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn top_level_ignores_nested_and_debris() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "._Foo.app");
        touch(tmp.path(), "nested/Deep.app/Contents/Info.plist");
        std::fs::create_dir_all(tmp.path().join("__MACOSX/Foo.app")).unwrap();
        assert_eq!(find_top_level(tmp.path(), ArtifactKind::AppBundle).await.unwrap(), None);

        std::fs::create_dir_all(tmp.path().join("Foo.app/Contents")).unwrap();
        assert_eq!(
            find_top_level(tmp.path(), ArtifactKind::AppBundle).await.unwrap(),
            Some(tmp.path().join("Foo.app"))
        );
    }

    #[tokio::test]
    async fn top_level_app_must_be_directory() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "Fake.app");
        assert_eq!(find_top_level(tmp.path(), ArtifactKind::AppBundle).await.unwrap(), None);
    }

    #[tokio::test]
    async fn top_level_picks_first_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "b.dmg");
        touch(tmp.path(), "a.dmg");
        assert_eq!(
            find_top_level(tmp.path(), ArtifactKind::DiskImage).await.unwrap(),
            Some(tmp.path().join("a.dmg"))
        );
    }

    #[tokio::test]
    async fn recursive_finds_deep_package() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "a/b/c/installer.pkg");
        touch(tmp.path(), "a/b/readme.txt");
        touch(tmp.path(), "__MACOSX/a/b/c/._installer.pkg");
        assert_eq!(
            find_recursive(tmp.path(), ArtifactKind::Package, 8).await.unwrap(),
            Some(tmp.path().join("a/b/c/installer.pkg"))
        );
    }

    #[tokio::test]
    async fn recursive_respects_depth_limit() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "a/b/c/installer.pkg");
        assert_eq!(
            find_recursive(tmp.path(), ArtifactKind::Package, 3).await.unwrap(),
            None
        );
        assert!(
            find_recursive(tmp.path(), ArtifactKind::Package, 4)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recursive_survives_symlink_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("loop/back")).unwrap();
        assert_eq!(
            find_recursive(tmp.path(), ArtifactKind::Package, 64).await.unwrap(),
            None
        );
    }
}
