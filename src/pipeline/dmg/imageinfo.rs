//! Disk image metadata via `hdiutil imageinfo -plist`.

use crate::pipeline::error::Result;
use crate::pipeline::tools::{Tool, ToolAdapter, commands, run_checked};
use std::io::Cursor;
use std::path::Path;

/// Key of the nested properties map in `imageinfo` output.
const PROPERTIES_KEY: &str = "Properties";

/// License-agreement flag inside the properties map.
const LICENSE_AGREEMENT_KEY: &str = "Software License Agreement";

/// The parts of `imageinfo` output the pipeline uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageInfo {
    /// Image format code (`UDZO`, `UDRW`, ...), when reported
    pub format: Option<String>,
    /// Whether the image embeds a software license agreement
    pub has_license_agreement: bool,
}

impl ImageInfo {
    /// Parses the property list printed by `hdiutil imageinfo -plist`.
    ///
    /// A missing properties map or flag reads as "no license agreement".
    pub fn from_plist(bytes: &[u8]) -> Result<Self> {
        let value = plist::Value::from_reader(Cursor::new(bytes))?;
        let root = value.as_dictionary();

        let format = root
            .and_then(|d| d.get("Format"))
            .and_then(|v| v.as_string())
            .map(str::to_string);

        let has_license_agreement = root
            .and_then(|d| d.get(PROPERTIES_KEY))
            .and_then(|v| v.as_dictionary())
            .and_then(|props| props.get(LICENSE_AGREEMENT_KEY))
            .and_then(|v| v.as_boolean())
            .unwrap_or(false);

        Ok(Self {
            format,
            has_license_agreement,
        })
    }
}

/// Queries metadata for `image`.
pub async fn read_image_info<T: ToolAdapter>(tools: &T, image: &Path) -> Result<ImageInfo> {
    let args = commands::imageinfo(image)?;
    let output = run_checked(tools, Tool::Hdiutil, &args).await?;
    ImageInfo::from_plist(&output.stdout)
}
