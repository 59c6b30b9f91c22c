//! Deadline- and cancellation-aware invocation of the image toolchain.

use std::path::Path;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use kiln_core::error::{KilnError, Result};

use super::toolchain::ImageToolchain;

/// Build `tag` from `workspace`, failing with `TimeoutError` at `deadline`.
///
/// The in-flight build is dropped (and its process killed) when the deadline
/// passes or `ctx` is cancelled. An already-cancelled `ctx` never starts it.
pub async fn drive_build(
    ctx: &CancellationToken,
    toolchain: &dyn ImageToolchain,
    workspace: &Path,
    tag: &str,
    deadline: Instant,
) -> Result<()> {
    if ctx.is_cancelled() {
        return Err(KilnError::Cancelled);
    }
    if Instant::now() >= deadline {
        return Err(KilnError::TimeoutError(format!(
            "deadline passed before building {}",
            tag
        )));
    }

    tracing::info!(tag, workspace = %workspace.display(), "Building image");

    tokio::select! {
        biased;
        _ = ctx.cancelled() => {
            tracing::warn!(tag, "Image build cancelled");
            Err(KilnError::Cancelled)
        }
        result = tokio::time::timeout_at(deadline, toolchain.build(workspace, tag)) => match result {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(tag, "Image build timed out");
                Err(KilnError::TimeoutError(format!(
                    "building {} did not finish before the deadline",
                    tag
                )))
            }
        },
    }
}

/// Push `tag`. Not bounded by the build deadline, only by `ctx`.
pub async fn drive_push(
    ctx: &CancellationToken,
    toolchain: &dyn ImageToolchain,
    tag: &str,
) -> Result<()> {
    if ctx.is_cancelled() {
        return Err(KilnError::Cancelled);
    }

    tracing::info!(tag, "Pushing image");

    tokio::select! {
        biased;
        _ = ctx.cancelled() => {
            tracing::warn!(tag, "Image push cancelled");
            Err(KilnError::Cancelled)
        }
        result = toolchain.push(tag) => result,
    }
}
