//! Caller-facing entry point.
//!
//! [`Pipeline::start`] validates the URL, then runs download, resolution and
//! inspection on a spawned task. Progress arrives as [`PipelineEvent`]s; the
//! task ends with one [`Outcome`]. A ready review owns the workspace until the
//! caller runs [`IdentityReview::finalize`]; a failed run finalizes its
//! workspace itself before reporting.

use crate::pipeline::checksum::artifact_sha256;
use crate::pipeline::download::{DownloadProgress, DownloadedFile, Downloader, validate_url};
use crate::pipeline::error::{Error, ErrorExt, Result};
use crate::pipeline::inspect::{
    IdentityCandidate, IdentityInspector, Inspection, SignatureVerdict, SystemInspector,
    inspect_artifact,
};
use crate::pipeline::resolver::{DeclaredType, ResolutionRequest, Resolver, TerminalArtifact};
use crate::pipeline::settings::Settings;
use crate::pipeline::tools::{SystemTools, ToolAdapter};
use crate::pipeline::utils::fs;
use crate::pipeline::workspace::{FinalizeMode, Workspace};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Pipeline phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// HTTP transfer
    Downloading,
    /// Unwrapping containers
    Resolving,
    /// Reading identity, signature and checksum
    Inspecting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Downloading => f.write_str("downloading"),
            Stage::Resolving => f.write_str("resolving"),
            Stage::Inspecting => f.write_str("inspecting"),
        }
    }
}

/// Progress notifications emitted while a pipeline runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A new phase started
    Stage(Stage),
    /// Download progress
    Progress(DownloadProgress),
}

/// Final result of one pipeline run.
#[derive(Debug)]
pub enum Outcome<T: ToolAdapter> {
    /// Identity is ready for review; the workspace is still held
    Ready(IdentityReview<T>),
    /// The run failed; its workspace has already been finalized
    Failed(Error),
}

/// Serializable view of an identity review.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    /// Declared container type
    pub declared_type: DeclaredType,
    /// Innermost artifact
    pub artifact: TerminalArtifact,
    /// Identity candidates
    pub candidates: Vec<IdentityCandidate>,
    /// Signature verdict
    pub signature: SignatureVerdict,
    /// Hex SHA-256 of the artifact
    pub sha256: String,
}

/// Resolved artifact awaiting the caller's decision.
///
/// Must be ended with [`finalize`](Self::finalize) in either mode.
#[must_use = "an identity review holds a workspace until finalized"]
#[derive(Debug)]
pub struct IdentityReview<T: ToolAdapter> {
    declared: DeclaredType,
    artifact: TerminalArtifact,
    inspection: Inspection,
    sha256: String,
    workspace: Workspace,
    tools: Arc<T>,
}

impl<T: ToolAdapter> IdentityReview<T> {
    /// Declared container type.
    pub fn declared_type(&self) -> DeclaredType {
        self.declared
    }

    /// Innermost artifact inside the workspace.
    pub fn artifact(&self) -> &TerminalArtifact {
        &self.artifact
    }

    /// Identity candidates, possibly empty.
    pub fn candidates(&self) -> &[IdentityCandidate] {
        &self.inspection.candidates
    }

    /// Signature verdict.
    pub fn signature(&self) -> &SignatureVerdict {
        &self.inspection.signature
    }

    /// Hex SHA-256 of the artifact.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Workspace holding the artifact.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Owned, serializable copy of the review.
    pub fn summary(&self) -> ReviewSummary {
        ReviewSummary {
            declared_type: self.declared,
            artifact: self.artifact.clone(),
            candidates: self.inspection.candidates.clone(),
            signature: self.inspection.signature.clone(),
            sha256: self.sha256.clone(),
        }
    }

    /// Copies the artifact into `dest_dir`, keeping its file name.
    pub async fn export_artifact(&self, dest_dir: &Path) -> Result<PathBuf> {
        let name = self
            .artifact
            .path
            .file_name()
            .ok_or_else(|| Error::GenericError("artifact has no file name".into()))?;
        tokio::fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating export directory", dest_dir)?;

        let dest = dest_dir.join(name);
        fs::copy_path(&self.artifact.path, &dest).await?;
        log::info!("Exported {}", dest.display());
        Ok(dest)
    }

    /// Detaches any mount and removes the workspace.
    pub async fn finalize(self, mode: FinalizeMode) -> Result<()> {
        self.workspace.finalize(self.tools.as_ref(), mode).await
    }
}

/// Running pipeline.
#[derive(Debug)]
pub struct PipelineHandle<T: ToolAdapter> {
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    task: JoinHandle<Outcome<T>>,
    cancel: CancellationToken,
}

impl<T: ToolAdapter> PipelineHandle<T> {
    /// Next progress event; `None` once the run has ended.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Requests cancellation. Observed during the transfer and between stages.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token shared with the running task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the outcome, discarding remaining events.
    pub async fn outcome(self) -> Outcome<T> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => Outcome::Failed(Error::GenericError(format!("Pipeline task failed: {e}"))),
        }
    }
}

enum Source {
    Remote(Url),
    Local(PathBuf),
}

/// Resolution pipeline bound to a tool adapter and an inspector.
pub struct Pipeline<T: ToolAdapter, I: IdentityInspector> {
    settings: Arc<Settings>,
    tools: Arc<T>,
    inspector: Arc<I>,
    downloader: Downloader,
}

impl Pipeline<SystemTools, SystemInspector<SystemTools>> {
    /// Pipeline running the real platform tools.
    pub fn system(settings: Settings) -> Result<Self> {
        let tools = Arc::new(SystemTools::new(&settings));
        let inspector = Arc::new(SystemInspector::new(tools.clone(), &settings));
        Self::new(settings, tools, inspector)
    }
}

impl<T: ToolAdapter, I: IdentityInspector> Pipeline<T, I> {
    /// Creates a pipeline; builds the HTTP client from `settings`.
    pub fn new(settings: Settings, tools: Arc<T>, inspector: Arc<I>) -> Result<Self> {
        let downloader = Downloader::new(&settings)?;
        Ok(Self {
            settings: Arc::new(settings),
            tools,
            inspector,
            downloader,
        })
    }

    /// Settings in use.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Downloads `url` and resolves it as `declared`.
    ///
    /// An invalid URL is rejected here, before anything is allocated.
    pub fn start(&self, declared: DeclaredType, url: &str) -> Result<PipelineHandle<T>> {
        let url = validate_url(url)?;
        Ok(self.spawn(declared, Source::Remote(url)))
    }

    /// Resolves an already downloaded file as `declared`.
    ///
    /// The file is copied into the workspace; the original is left untouched.
    pub fn start_local(&self, declared: DeclaredType, path: &Path) -> Result<PipelineHandle<T>> {
        if !path.is_file() {
            return Err(Error::GenericError(format!(
                "local source {} is not a file",
                path.display()
            )));
        }
        Ok(self.spawn(declared, Source::Local(path.to_path_buf())))
    }

    fn spawn(&self, declared: DeclaredType, source: Source) -> PipelineHandle<T> {
        let (events, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let run = Run {
            settings: self.settings.clone(),
            tools: self.tools.clone(),
            inspector: self.inspector.clone(),
            downloader: self.downloader.clone(),
            events,
            cancel: cancel.clone(),
        };

        PipelineHandle {
            events: receiver,
            task: tokio::spawn(run.execute(declared, source)),
            cancel,
        }
    }
}

/// State moved into the spawned task.
struct Run<T: ToolAdapter, I: IdentityInspector> {
    settings: Arc<Settings>,
    tools: Arc<T>,
    inspector: Arc<I>,
    downloader: Downloader,
    events: mpsc::UnboundedSender<PipelineEvent>,
    cancel: CancellationToken,
}

enum Fetched {
    Downloaded(DownloadedFile),
    Local(PathBuf),
}

impl<T: ToolAdapter, I: IdentityInspector> Run<T, I> {
    fn emit(&self, event: PipelineEvent) {
        // The receiver may be gone; the outcome is still delivered.
        let _ = self.events.send(event);
    }

    fn stage(&self, stage: Stage) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        log::info!("Stage: {}", stage);
        self.emit(PipelineEvent::Stage(stage));
        Ok(())
    }

    async fn execute(self, declared: DeclaredType, source: Source) -> Outcome<T> {
        let fetched = match self.fetch(source).await {
            Ok(fetched) => fetched,
            Err(e) => return Outcome::Failed(e),
        };

        let mut workspace = match Workspace::allocate(&self.settings).await {
            Ok(workspace) => workspace,
            Err(e) => return Outcome::Failed(e),
        };

        match self.process(declared, fetched, &mut workspace).await {
            Ok((artifact, inspection, sha256)) => Outcome::Ready(IdentityReview {
                declared,
                artifact,
                inspection,
                sha256,
                workspace,
                tools: self.tools.clone(),
            }),
            Err(e) => {
                if let Err(finalize_error) =
                    workspace.finalize(self.tools.as_ref(), FinalizeMode::Cancel).await
                {
                    log::warn!("Cleanup after failure also failed: {}", finalize_error);
                }
                Outcome::Failed(e)
            }
        }
    }

    async fn fetch(&self, source: Source) -> Result<Fetched> {
        match source {
            Source::Remote(url) => {
                self.stage(Stage::Downloading)?;
                let downloaded = self
                    .downloader
                    .download(&url, &self.cancel, |progress| {
                        self.emit(PipelineEvent::Progress(progress))
                    })
                    .await?;
                Ok(Fetched::Downloaded(downloaded))
            }
            Source::Local(path) => Ok(Fetched::Local(path)),
        }
    }

    async fn process(
        &self,
        declared: DeclaredType,
        fetched: Fetched,
        workspace: &mut Workspace,
    ) -> Result<(TerminalArtifact, Inspection, String)> {
        let source = match fetched {
            Fetched::Downloaded(downloaded) => downloaded.into_workspace(workspace).await?,
            Fetched::Local(path) => {
                let name = path
                    .file_name()
                    .ok_or_else(|| Error::GenericError("local source has no file name".into()))?;
                let dest = workspace.scratch_dir("source").await?.join(name);
                fs::copy_file(&path, &dest).await?;
                dest
            }
        };

        self.stage(Stage::Resolving)?;
        let request = ResolutionRequest::new(declared, source, workspace);
        let artifact = Resolver::new(self.tools.as_ref(), &self.settings)
            .with_cancellation(self.cancel.clone())
            .resolve(&request, workspace)
            .await?;

        self.stage(Stage::Inspecting)?;
        let inspection = inspect_artifact(self.inspector.as_ref(), &artifact).await?;
        let sha256 = artifact_sha256(&artifact.path).await?;

        Ok((artifact, inspection, sha256))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::settings::SettingsBuilder;
    use crate::pipeline::testing::{FakeInspector, FakeTools, file, http_response, serve_once};
    use crate::pipeline::tools::ToolOutput;

    struct Fixture {
        tmp: tempfile::TempDir,
        pipeline: Pipeline<FakeTools, FakeInspector>,
        tools: Arc<FakeTools>,
    }

    fn fixture(tools: FakeTools, inspector: FakeInspector) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let settings = SettingsBuilder::new().temp_root(&work).build().unwrap();
        let tools = Arc::new(tools);
        let pipeline = Pipeline::new(settings, tools.clone(), Arc::new(inspector)).unwrap();
        Fixture {
            tmp,
            pipeline,
            tools,
        }
    }

    impl Fixture {
        fn input(&self, name: &str) -> PathBuf {
            let dir = self.tmp.path().join("in");
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path
        }

        fn leftover_workspaces(&self) -> usize {
            std::fs::read_dir(self.tmp.path().join("work")).unwrap().count()
        }
    }

    async fn drain(mut handle: PipelineHandle<FakeTools>) -> (Vec<PipelineEvent>, Outcome<FakeTools>) {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        (events, handle.outcome().await)
    }

    #[tokio::test]
    async fn failing_signature_still_reaches_review() {
        let tools = FakeTools::new().with_archive(
            "vendor.zip",
            vec![file("payload/inner/deeper/Vendor.pkg", b"pkg")],
        );
        let fx = fixture(
            tools,
            FakeInspector::new("com.vendor.agent", "3.1").with_failing_signature(),
        );
        let source = fx.input("vendor.zip");

        let handle = fx
            .pipeline
            .start_local(DeclaredType::PackageInZip, &source)
            .unwrap();
        let (events, outcome) = drain(handle).await;

        assert_eq!(
            events,
            [
                PipelineEvent::Stage(Stage::Resolving),
                PipelineEvent::Stage(Stage::Inspecting)
            ]
        );
        let Outcome::Ready(review) = outcome else {
            panic!("expected a review");
        };
        assert_eq!(review.candidates().len(), 1);
        assert_eq!(review.candidates()[0].identifier, "com.vendor.agent");
        assert_eq!(review.signature(), &SignatureVerdict::unknown());
        assert_eq!(review.sha256().len(), 64);
        assert!(review.artifact().path.ends_with("Vendor.pkg"));

        review.finalize(FinalizeMode::Cancel).await.unwrap();
        assert_eq!(fx.leftover_workspaces(), 0);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn failed_resolution_finalizes_its_workspace() {
        let tools = FakeTools::new().with_output("unzip", ToolOutput::failed(1, "bad zip"));
        let fx = fixture(tools, FakeInspector::new("a", "1"));
        let source = fx.input("broken.zip");

        let handle = fx.pipeline.start_local(DeclaredType::Zip, &source).unwrap();
        let Outcome::Failed(err) = handle.outcome().await else {
            panic!("expected failure");
        };
        assert!(matches!(err, Error::ToolExecution { exit_code: 1, .. }));
        assert_eq!(fx.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn failure_with_image_attached_leaves_no_mount() {
        let tools = FakeTools::new()
            .with_image("Tool.dmg", false, vec![file("README", b"no app here")]);
        let fx = fixture(tools, FakeInspector::new("a", "1"));
        let source = fx.input("Tool.dmg");

        let handle = fx.pipeline.start_local(DeclaredType::DiskImage, &source).unwrap();
        let Outcome::Failed(err) = handle.outcome().await else {
            panic!("expected failure");
        };
        assert!(matches!(err, Error::MissingArtifact { .. }));
        assert!(fx.tools.mounted().is_empty());
        assert_eq!(fx.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn cancel_before_first_stage_cleans_up() {
        let fx = fixture(FakeTools::new(), FakeInspector::new("a", "1"));
        let source = fx.input("Vendor.pkg");

        let handle = fx
            .pipeline
            .start_local(DeclaredType::Package, &source)
            .unwrap();
        handle.cancel();

        let Outcome::Failed(err) = handle.outcome().await else {
            panic!("expected cancellation");
        };
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(fx.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn commit_after_export_keeps_only_the_export() {
        let tools = FakeTools::new().with_image(
            "Tool.dmg",
            false,
            vec![file("Tool.app/Contents/Info.plist", b"plist")],
        );
        let fx = fixture(tools, FakeInspector::new("com.vendor.tool", "2.0"));
        let source = fx.input("Tool.dmg");

        let handle = fx.pipeline.start_local(DeclaredType::DiskImage, &source).unwrap();
        let Outcome::Ready(review) = handle.outcome().await else {
            panic!("expected a review");
        };
        assert!(review.signature().accepted);

        let out = fx.tmp.path().join("out");
        let exported = review.export_artifact(&out).await.unwrap();
        review.finalize(FinalizeMode::Commit).await.unwrap();

        assert!(exported.join("Contents/Info.plist").is_file());
        assert_eq!(fx.leftover_workspaces(), 0);
        assert_eq!(
            fx.tools.call_keys(),
            ["hdiutil attach", "hdiutil detach"]
        );
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_allocation() {
        let fx = fixture(FakeTools::new(), FakeInspector::new("a", "1"));
        let err = fx
            .pipeline
            .start(DeclaredType::Package, "not a url")
            .unwrap_err();
        assert!(err.is_download());
        assert_eq!(fx.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn summary_serializes_review() {
        let fx = fixture(FakeTools::new(), FakeInspector::new("com.vendor.agent", "1.2"));
        let source = fx.input("Vendor.pkg");

        let handle = fx.pipeline.start_local(DeclaredType::Package, &source).unwrap();
        let Outcome::Ready(review) = handle.outcome().await else {
            panic!("expected a review");
        };
        let json = serde_json::to_value(review.summary()).unwrap();
        assert_eq!(json["declaredType"], "package");
        assert_eq!(json["artifact"]["kind"], "package");
        assert_eq!(json["candidates"][0]["identifier"], "com.vendor.agent");
        assert_eq!(json["signature"]["developerTeam"], "ABCDE12345");
        review.finalize(FinalizeMode::Cancel).await.unwrap();
    }

    #[tokio::test]
    async fn downloaded_package_reaches_review() {
        let fx = fixture(FakeTools::new(), FakeInspector::new("com.vendor.agent", "5.0"));
        let base = serve_once(http_response(
            "200 OK",
            "Content-Disposition: attachment; filename=\"Vendor Agent.pkg\"\r\n",
            b"flat-package",
        ))
        .await;

        let handle = fx
            .pipeline
            .start(DeclaredType::Package, &format!("{base}/latest"))
            .unwrap();
        let (events, outcome) = drain(handle).await;

        assert_eq!(events.first(), Some(&PipelineEvent::Stage(Stage::Downloading)));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::Progress(DownloadProgress { bytes_written: 12, .. })
        )));
        assert_eq!(
            events[events.len() - 2..],
            [
                PipelineEvent::Stage(Stage::Resolving),
                PipelineEvent::Stage(Stage::Inspecting)
            ]
        );

        let Outcome::Ready(review) = outcome else {
            panic!("expected a review");
        };
        assert!(review.artifact().path.starts_with(review.workspace().root()));
        assert!(review.artifact().path.ends_with("Vendor Agent.pkg"));
        assert_eq!(std::fs::read(&review.artifact().path).unwrap(), b"flat-package");
        review.finalize(FinalizeMode::Cancel).await.unwrap();
        assert_eq!(fx.leftover_workspaces(), 0);
    }

    #[tokio::test]
    async fn http_error_leaves_no_workspace() {
        let fx = fixture(FakeTools::new(), FakeInspector::new("a", "1"));
        let base = serve_once(http_response("404 Not Found", "", b"gone")).await;

        let handle = fx
            .pipeline
            .start(DeclaredType::Package, &format!("{base}/Vendor.pkg"))
            .unwrap();
        let Outcome::Failed(err) = handle.outcome().await else {
            panic!("expected failure");
        };
        assert!(err.is_download());
        assert_eq!(fx.leftover_workspaces(), 0);
        assert!(fx.tools.call_keys().is_empty());
    }
}
