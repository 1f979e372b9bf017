//! SHA-256 digests of resolved artifacts.
//!
//! Flat packages are hashed as files. App bundles and bundle-style packages
//! are directory trees: every entry contributes its relative path, then its
//! content (files) or link target (symlinks), in file-name order.

use crate::bail;
use crate::pipeline::error::{Error, ErrorExt, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const CHUNK: usize = 64 * 1024;

/// Hex-encoded SHA-256 of a file or directory tree.
pub async fn artifact_sha256(path: &Path) -> Result<String> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .fs_context("reading artifact metadata", path)?;

    let mut hasher = Sha256::new();
    if metadata.is_file() {
        hash_file(&mut hasher, path).await?;
    } else if metadata.is_dir() {
        hash_tree(&mut hasher, path).await?;
    } else {
        bail!("Artifact is neither file nor directory: {}", path.display())
    }

    Ok(format!("{:x}", hasher.finalize()))
}

async fn hash_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for hashing", path)?;
    let mut buffer = vec![0u8; CHUNK];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hashing", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(())
}

async fn hash_tree(hasher: &mut Sha256, root: &Path) -> Result<()> {
    let owned = root.to_path_buf();
    let entries = tokio::task::spawn_blocking(move || {
        walkdir::WalkDir::new(&owned)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| Error::GenericError(format!("Checksum walk task panicked: {e}")))??;

    for entry in entries {
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let file_type = entry.file_type();

        if file_type.is_file() {
            hasher.update(b"f\0");
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hash_file(hasher, entry.path()).await?;
        } else if file_type.is_symlink() {
            let target = tokio::fs::read_link(entry.path())
                .await
                .fs_context("reading symlink for hashing", entry.path())?;
            hasher.update(b"l\0");
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update(b"\0");
            hasher.update(target.to_string_lossy().as_bytes());
        }
    }
    Ok(())
}
