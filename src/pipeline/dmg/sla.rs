//! License-agreement normalization.
//!
//! An image that embeds a software license agreement cannot be attached
//! non-interactively. Such images are converted to a read-write format first,
//! which drops the agreement, and the converted file replaces the original so
//! later steps keep using the same path.

use super::read_image_info;
use crate::pipeline::error::{Error, ErrorExt, Result};
use crate::pipeline::tools::{Tool, ToolAdapter, commands};
use crate::pipeline::utils::fs;
use crate::pipeline::workspace::Workspace;
use std::path::{Path, PathBuf};

/// Converts `image` in place if it carries a license agreement.
///
/// Returns the path to attach, which is always `image` itself. Without a
/// license agreement no conversion is run.
///
/// # Errors
///
/// [`Error::Conversion`] when `hdiutil convert` exits non-zero or reports
/// success without producing its output file. The image is never attached here.
pub async fn normalize_if_needed<T: ToolAdapter>(
    tools: &T,
    workspace: &mut Workspace,
    image: &Path,
) -> Result<PathBuf> {
    let info = read_image_info(tools, image).await?;
    if !info.has_license_agreement {
        log::debug!("{} has no license agreement", image.display());
        return Ok(image.to_path_buf());
    }

    log::info!(
        "{} embeds a license agreement, converting to a writable image...",
        image.display()
    );

    let converted = workspace.unique_path("converted").with_extension("dmg");
    let args = commands::convert(image, &converted)?;
    let output = tools.run(Tool::Hdiutil, &args).await?;

    if !output.success() {
        return Err(Error::Conversion(format!(
            "hdiutil convert exited with status {}: {}",
            output.exit_code.unwrap_or(-1),
            output.stderr_lossy().trim()
        )));
    }

    if !tokio::fs::try_exists(&converted).await.unwrap_or(false) {
        return Err(Error::Conversion(format!(
            "hdiutil convert reported success but {} does not exist",
            converted.display()
        )));
    }

    // Replace the original with the converted image
    tokio::fs::remove_file(image)
        .await
        .fs_context("removing license-gated image", image)?;
    fs::move_file(&converted, image).await?;

    log::info!("✓ {} converted to {}", image.display(), commands::WRITABLE_IMAGE_FORMAT);
    Ok(image.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::settings::SettingsBuilder;
    use crate::pipeline::testing::FakeTools;
    use crate::pipeline::tools::ToolOutput;
    use crate::pipeline::workspace::FinalizeMode;

    async fn setup() -> (tempfile::TempDir, Workspace, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let settings = SettingsBuilder::new().temp_root(tmp.path()).build().unwrap();
        let ws = Workspace::allocate(&settings).await.unwrap();
        let image = ws.root().join("Vendor.dmg");
        std::fs::write(&image, b"original").unwrap();
        (tmp, ws, image)
    }

    #[tokio::test]
    async fn image_without_license_is_untouched() {
        let tools = FakeTools::new().with_image("Vendor.dmg", false, vec![]);
        let (_tmp, mut ws, image) = setup().await;

        let path = normalize_if_needed(&tools, &mut ws, &image).await.unwrap();

        assert_eq!(path, image);
        assert_eq!(tools.call_keys(), ["hdiutil imageinfo"]);
        assert_eq!(std::fs::read(&image).unwrap(), b"original");
        ws.finalize(&tools, FinalizeMode::Cancel).await.unwrap();
    }

    #[tokio::test]
    async fn licensed_image_is_converted_once_and_replaced() {
        let tools = FakeTools::new().with_image("Vendor.dmg", true, vec![]);
        let (_tmp, mut ws, image) = setup().await;

        let path = normalize_if_needed(&tools, &mut ws, &image).await.unwrap();

        assert_eq!(path, image);
        assert_eq!(tools.count("hdiutil convert"), 1);
        assert_eq!(std::fs::read(&image).unwrap(), b"converted");
        let leftovers: Vec<_> = std::fs::read_dir(ws.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("converted"))
            .collect();
        assert!(leftovers.is_empty());
        ws.finalize(&tools, FinalizeMode::Cancel).await.unwrap();
    }

    #[tokio::test]
    async fn failing_convert_is_conversion_error() {
        let tools = FakeTools::new()
            .with_image("Vendor.dmg", true, vec![])
            .with_output("hdiutil convert", ToolOutput::failed(1, "no space"));
        let (_tmp, mut ws, image) = setup().await;

        let err = normalize_if_needed(&tools, &mut ws, &image).await.unwrap_err();

        assert!(matches!(err, Error::Conversion(ref m) if m.contains("no space")));
        assert_eq!(std::fs::read(&image).unwrap(), b"original");
        ws.finalize(&tools, FinalizeMode::Cancel).await.unwrap();
    }

    #[tokio::test]
    async fn missing_converted_file_is_conversion_error() {
        let tools = FakeTools::new()
            .with_image("Vendor.dmg", true, vec![])
            .with_convert_dropping_output();
        let (_tmp, mut ws, image) = setup().await;

        let err = normalize_if_needed(&tools, &mut ws, &image).await.unwrap_err();

        assert!(matches!(err, Error::Conversion(ref m) if m.contains("does not exist")));
        assert_eq!(tools.count("hdiutil attach"), 0);
        ws.finalize(&tools, FinalizeMode::Cancel).await.unwrap();
    }
}
