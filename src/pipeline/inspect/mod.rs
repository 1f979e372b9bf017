//! Identity inspection of terminal artifacts.
//!
//! An [`IdentityInspector`] reads identity candidates and the signature of a
//! resolved package or app bundle. [`inspect_artifact`] applies the pipeline
//! policy on top: identity failures abort, signature failures degrade to an
//! unknown verdict.

mod package_info;
mod signature;
mod system;

pub use package_info::{parse_distribution_minimum_os, parse_package_info};
pub use signature::{parse_codesign_details, parse_pkgutil_signature, split_certificate_name};
pub use system::SystemInspector;

use crate::pipeline::error::{Error, Result};
use crate::pipeline::resolver::{ArtifactKind, TerminalArtifact};
use serde::Serialize;
use std::future::Future;
use std::path::Path;

/// One identity found in an artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCandidate {
    /// Bundle or package identifier
    pub identifier: String,
    /// Version string as declared by the artifact
    pub version: String,
    /// Minimum OS version, when the artifact declares one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_os: Option<String>,
}

/// Outcome of a signature check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureVerdict {
    /// Whether the signature verified
    pub accepted: bool,
    /// Developer name from the leaf certificate
    pub developer_id: String,
    /// Team identifier
    pub developer_team: String,
}

impl SignatureVerdict {
    /// Placeholder for fields that could not be determined.
    pub const UNKNOWN: &'static str = "Unknown";

    /// Verdict used when the signature cannot be read.
    pub fn unknown() -> Self {
        Self {
            accepted: false,
            developer_id: Self::UNKNOWN.to_string(),
            developer_team: Self::UNKNOWN.to_string(),
        }
    }
}

/// Reads identity and signature information from artifacts on disk.
pub trait IdentityInspector: Send + Sync + 'static {
    /// Identity candidates of an installer package. Zero candidates is valid.
    fn inspect_package(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Vec<IdentityCandidate>>> + Send;

    /// Identity candidates of an app bundle. Zero candidates is valid.
    fn inspect_app(&self, path: &Path)
    -> impl Future<Output = Result<Vec<IdentityCandidate>>> + Send;

    /// Signature verdict for a package or app bundle.
    fn inspect_signature(
        &self,
        artifact: &TerminalArtifact,
    ) -> impl Future<Output = Result<SignatureVerdict>> + Send;
}

/// Identity data gathered for review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    /// Identity candidates, possibly empty
    pub candidates: Vec<IdentityCandidate>,
    /// Signature verdict, unknown when it could not be read
    pub signature: SignatureVerdict,
}

/// Inspects `artifact`, degrading signature failures to [`SignatureVerdict::unknown`].
pub async fn inspect_artifact<I: IdentityInspector>(
    inspector: &I,
    artifact: &TerminalArtifact,
) -> Result<Inspection> {
    let candidates = match artifact.kind {
        ArtifactKind::Package => inspector.inspect_package(&artifact.path).await?,
        ArtifactKind::AppBundle => inspector.inspect_app(&artifact.path).await?,
        ArtifactKind::DiskImage => {
            return Err(Error::Inspection(format!(
                "cannot inspect a bare disk image: {}",
                artifact.path.display()
            )));
        }
    };
    log::debug!("Found {} identity candidate(s)", candidates.len());

    let signature = match inspector.inspect_signature(artifact).await {
        Ok(verdict) => verdict,
        Err(e) => {
            log::warn!("Signature of {} unreadable: {}", artifact.path.display(), e);
            SignatureVerdict::unknown()
        }
    };

    Ok(Inspection {
        candidates,
        signature,
    })
}
