//! macOS disk image handling.
//!
//! - `imageinfo` - reading `hdiutil imageinfo -plist` metadata
//! - `sla` - license-agreement normalization before attach

mod imageinfo;
mod sla;

pub use imageinfo::{ImageInfo, read_image_info};
pub use sla::normalize_if_needed;
