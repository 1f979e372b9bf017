//! Download and nested-container resolution pipeline.
//!
//! Turns a vendor download URL plus a declared container type into the
//! innermost installer package or app bundle, reads its identity and
//! signature, and holds the scratch workspace until the caller finalizes.
//!
//! # Modules
//!
//! - [`coordinator`] - caller-facing [`Pipeline`] and review lifecycle
//! - [`download`] - HTTP transfer with progress
//! - [`resolver`] - unwrap state machine over the eight declared types
//! - [`dmg`] - license-agreement detection and normalization
//! - [`workspace`] - scratch directory and mount tracking
//! - [`inspect`] - identity and signature inspection
//! - [`tools`] - subprocess adapter for the platform utilities
//! - [`settings`] - configuration
//! - [`error`] - error taxonomy

pub mod checksum;
pub mod coordinator;
pub mod dmg;
pub mod download;
pub mod error;
pub mod inspect;
pub mod resolver;
pub mod settings;
pub mod tools;
pub mod utils;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{
    IdentityReview, Outcome, Pipeline, PipelineEvent, PipelineHandle, ReviewSummary, Stage,
};
pub use download::DownloadProgress;
pub use error::{DownloadError, Error, Result};
pub use inspect::{IdentityCandidate, IdentityInspector, SignatureVerdict, SystemInspector};
pub use resolver::{ArtifactKind, DeclaredType, ResolutionRequest, Resolver, TerminalArtifact};
pub use settings::{Settings, SettingsBuilder};
pub use tools::{SystemTools, Tool, ToolAdapter, ToolOutput};
pub use workspace::{FinalizeMode, Workspace};
