//! `resolve`: run the pipeline and print the identity review.

use super::{load_settings, warn_missing_tools};
use crate::cli::{OutputManager, ResolveArgs, RuntimeConfig};
use crate::error::{CliError, Result};
use crate::pipeline::utils::fs;
use crate::pipeline::{
    Error, FinalizeMode, IdentityReview, Outcome, Pipeline, PipelineEvent, PipelineHandle,
    ReviewSummary, ToolAdapter,
};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Runs one resolution and finalizes it.
///
/// With `--output` the artifact is exported and the review committed;
/// otherwise the review is cancelled after printing. Ctrl-C cancels the run
/// until the review is finalized, including during the export.
pub async fn resolve(args: &ResolveArgs, runtime_config: &RuntimeConfig) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let settings = load_settings(args.config.as_deref())?;
    warn_missing_tools(&settings, runtime_config)?;

    let pipeline = Pipeline::system(settings)?;
    let handle = match (&args.url, &args.path) {
        (Some(url), None) => pipeline.start(args.declared_type, url)?,
        (None, Some(path)) => pipeline.start_local(args.declared_type, path)?,
        _ => {
            return Err(CliError::InvalidArguments {
                reason: "exactly one of --url or --path is required".to_string(),
            }
            .into());
        }
    };

    let cancel = handle.cancellation_token();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let output = runtime_config.output();
    let mut bar: Option<ProgressBar> = None;
    let followed = follow(handle, |event| {
        match event {
            PipelineEvent::Stage(stage) => {
                if let Some(bar) = bar.take() {
                    bar.finish_and_clear();
                }
                output.stage(stage)?;
            }
            PipelineEvent::Progress(progress) => match &bar {
                Some(bar) => bar.set_position(progress.bytes_written),
                None => bar = Some(output.download_bar(&progress)),
            },
        }
        Ok(())
    })
    .await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let result = match followed {
        Ok(Outcome::Ready(review)) => {
            let rendered = render_review(&review.summary(), args.json, output);
            match conclude(review, rendered, args.output.as_deref(), &cancel).await {
                Ok(Some(exported)) => output
                    .success(&format!("Artifact exported to {}", exported.display()))
                    .map(|()| 0)
                    .map_err(Into::into),
                Ok(None) => Ok(0),
                Err(e) => Err(e),
            }
        }
        Ok(Outcome::Failed(e)) => Err(e.into()),
        Err(e) => Err(e),
    };
    interrupt.abort();
    result
}

/// Feeds events to `render` until the run ends.
///
/// If rendering fails the run is cancelled and its outcome finalized before
/// the render error is returned.
async fn follow<T, F>(mut handle: PipelineHandle<T>, mut render: F) -> Result<Outcome<T>>
where
    T: ToolAdapter,
    F: FnMut(PipelineEvent) -> Result<()>,
{
    while let Some(event) = handle.next_event().await {
        if let Err(e) = render(event) {
            handle.cancel();
            match handle.outcome().await {
                Outcome::Ready(review) => discard(review).await,
                Outcome::Failed(failure) => log::debug!("Run ended after render error: {}", failure),
            }
            return Err(e);
        }
    }
    Ok(handle.outcome().await)
}

fn render_review(summary: &ReviewSummary, json: bool, output: &OutputManager) -> Result<()> {
    if json {
        output.result(&serde_json::to_string_pretty(summary)?)?;
    } else {
        output.review(summary)?;
    }
    if !summary.signature.accepted {
        output.warn("signature was not accepted")?;
    }
    Ok(())
}

/// Ends `review` whatever happened before.
///
/// Commits only after a completed, uninterrupted export into `export_dir`;
/// every other path cancels. Returns the exported artifact, if any.
async fn conclude<T: ToolAdapter>(
    review: IdentityReview<T>,
    rendered: Result<()>,
    export_dir: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<Option<PathBuf>> {
    if let Err(e) = rendered {
        discard(review).await;
        return Err(e);
    }
    let Some(dest) = export_dir else {
        review.finalize(FinalizeMode::Cancel).await?;
        return Ok(None);
    };
    if cancel.is_cancelled() {
        discard(review).await;
        return Err(Error::Cancelled.into());
    }

    let exported = match review.export_artifact(dest).await {
        Ok(exported) => exported,
        Err(e) => {
            discard(review).await;
            return Err(e.into());
        }
    };
    if cancel.is_cancelled() {
        if let Err(e) = fs::remove_path(&exported).await {
            log::warn!("Could not remove interrupted export: {}", e);
        }
        discard(review).await;
        return Err(Error::Cancelled.into());
    }

    review.finalize(FinalizeMode::Commit).await?;
    Ok(Some(exported))
}

/// Cancels `review`, logging a cleanup failure instead of returning it.
async fn discard<T: ToolAdapter>(review: IdentityReview<T>) {
    if let Err(e) = review.finalize(FinalizeMode::Cancel).await {
        log::warn!("Cleanup also failed: {}", e);
    }
}
