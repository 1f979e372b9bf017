//! Argument shapes for every external tool invocation.
//!
//! Paths are passed as UTF-8 strings; a non-UTF8 path is rejected up front
//! rather than handed to a tool in a lossy form.

use crate::pipeline::error::{Result, path_str};
use std::path::Path;

/// Writable disk image format used for license-agreement normalization.
pub const WRITABLE_IMAGE_FORMAT: &str = "UDRW";

/// `unzip -q <archive> -d <dest>`
pub fn unzip(archive: &Path, dest: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "-q".into(),
        path_str(archive, "zip archive")?.into(),
        "-d".into(),
        path_str(dest, "extraction")?.into(),
    ])
}

/// `tar -xf <archive> -C <dest>`
pub fn untar(archive: &Path, dest: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "-xf".into(),
        path_str(archive, "tar archive")?.into(),
        "-C".into(),
        path_str(dest, "extraction")?.into(),
    ])
}

/// `hdiutil attach <image> -mountpoint <mount_point> -nobrowse -quiet`
pub fn attach(image: &Path, mount_point: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "attach".into(),
        path_str(image, "disk image")?.into(),
        "-mountpoint".into(),
        path_str(mount_point, "mount point")?.into(),
        "-nobrowse".into(),
        "-quiet".into(),
    ])
}

/// `hdiutil detach <mount_point> -quiet -force`
pub fn detach(mount_point: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "detach".into(),
        path_str(mount_point, "mount point")?.into(),
        "-quiet".into(),
        "-force".into(),
    ])
}

/// `hdiutil imageinfo -plist <image>`
pub fn imageinfo(image: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "imageinfo".into(),
        "-plist".into(),
        path_str(image, "disk image")?.into(),
    ])
}

/// `hdiutil convert -format UDRW -o <output> <image>`
pub fn convert(image: &Path, output: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "convert".into(),
        "-format".into(),
        WRITABLE_IMAGE_FORMAT.into(),
        "-o".into(),
        path_str(output, "converted image")?.into(),
        path_str(image, "disk image")?.into(),
    ])
}

/// `pkgutil --expand <package> <dest>`
pub fn pkg_expand(package: &Path, dest: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "--expand".into(),
        path_str(package, "package")?.into(),
        path_str(dest, "expansion")?.into(),
    ])
}

/// `pkgutil --check-signature <package>`
pub fn pkg_check_signature(package: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "--check-signature".into(),
        path_str(package, "package")?.into(),
    ])
}

/// `codesign --verify --deep --strict <bundle>`
pub fn codesign_verify(bundle: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "--verify".into(),
        "--deep".into(),
        "--strict".into(),
        path_str(bundle, "app bundle")?.into(),
    ])
}

/// `codesign -dv --verbose=2 <bundle>` (details are printed on stderr)
pub fn codesign_display(bundle: &Path) -> Result<Vec<String>> {
    Ok(vec![
        "-dv".into(),
        "--verbose=2".into(),
        path_str(bundle, "app bundle")?.into(),
    ])
}
