//! Configuration structures for the resolution pipeline.
//!
//! [`Settings`] is read-only once a [`Pipeline`](crate::pipeline::Pipeline) is
//! constructed and is shared between concurrent resolutions.

mod builder;
mod core;
mod tools;

pub use builder::SettingsBuilder;
pub use self::core::Settings;
pub use tools::ToolSettings;
