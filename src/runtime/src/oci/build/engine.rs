//! Image build engine.
//!
//! Orchestrates one build invocation: derives the build spec from the
//! deployment, stages a workspace, builds the image under the build deadline
//! and pushes it. Every failure is tagged with the phase it occurred in.
//!
//! ```text
//! Init → SpecBuilt → Staged → Built → Pushed → Done
//!   └────────┴──────────┴────────┴───────┴──→ Failed
//! ```

use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use kiln_core::config::KilnConfig;
use kiln_core::error::{KilnError, Phase, Result};
use kiln_core::DeploymentDescriptor;

use super::driver::{drive_build, drive_push};
use super::spec::{build_image_specs_with, BuildSpec};
use super::toolchain::{DockerCli, ImageToolchain};
use super::workspace::{Workspace, WorkspaceOptions};

/// Progress of a single build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Init,
    SpecBuilt,
    Staged,
    Built,
    Pushed,
    Done,
    /// Failed in the given phase
    Failed(Phase),
}

impl BuildState {
    /// Whether the invocation has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::SpecBuilt => write!(f, "spec-built"),
            Self::Staged => write!(f, "staged"),
            Self::Built => write!(f, "built"),
            Self::Pushed => write!(f, "pushed"),
            Self::Done => write!(f, "done"),
            Self::Failed(phase) => write!(f, "failed({})", phase),
        }
    }
}

/// Records state transitions of one invocation.
#[derive(Debug)]
struct StateLog {
    states: Vec<BuildState>,
}

impl StateLog {
    fn new() -> Self {
        Self {
            states: vec![BuildState::Init],
        }
    }

    fn enter(&mut self, state: BuildState) {
        tracing::debug!(from = %self.current(), to = %state, "Build state transition");
        self.states.push(state);
    }

    fn current(&self) -> BuildState {
        self.states.last().copied().unwrap_or(BuildState::Init)
    }
}

/// Builds deployment images and publishes them.
///
/// Holds no per-build state, so one builder can serve concurrent invocations.
#[derive(Clone)]
pub struct ImageBuilder {
    config: KilnConfig,
    toolchain: Arc<dyn ImageToolchain>,
}

impl ImageBuilder {
    /// Create a builder that drives the configured docker-compatible CLI.
    pub fn new(config: KilnConfig) -> Result<Self> {
        config.validate()?;
        let toolchain = Arc::new(DockerCli::from_config(&config));
        Ok(Self { config, toolchain })
    }

    /// Create a builder around a custom toolchain.
    pub fn with_toolchain(config: KilnConfig, toolchain: Arc<dyn ImageToolchain>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, toolchain })
    }

    pub fn config(&self) -> &KilnConfig {
        &self.config
    }

    /// Build the image for `descriptor` and push it.
    ///
    /// Returns the pushed image reference (`<image_base>:<id prefix>`).
    pub async fn build_and_publish(
        &self,
        ctx: &CancellationToken,
        descriptor: &DeploymentDescriptor,
        image_base: &str,
    ) -> Result<String> {
        self.build_and_publish_traced(ctx, descriptor, image_base)
            .await
            .0
    }

    /// Like [`build_and_publish`](Self::build_and_publish), also returning
    /// every state the invocation passed through.
    pub async fn build_and_publish_traced(
        &self,
        ctx: &CancellationToken,
        descriptor: &DeploymentDescriptor,
        image_base: &str,
    ) -> (Result<String>, Vec<BuildState>) {
        let mut log = StateLog::new();
        let result = self.publish(ctx, descriptor, image_base, &mut log).await;

        match &result {
            Ok(tag) => {
                log.enter(BuildState::Done);
                tracing::info!(tag = %tag, "Image published");
            }
            Err(e) => {
                let phase = e.phase().unwrap_or(Phase::Spec);
                log.enter(BuildState::Failed(phase));
                tracing::error!(phase = %phase, error = %e, "Image build failed");
            }
        }

        (result, log.states)
    }

    /// Stage a workspace for `spec` and build it, within the build deadline.
    ///
    /// The workspace is removed before this returns, whatever the outcome.
    pub async fn build_image(&self, ctx: &CancellationToken, spec: &BuildSpec) -> Result<()> {
        self.build_staged(ctx, spec, &mut StateLog::new()).await
    }

    /// Push a previously built image.
    pub async fn push_image(&self, ctx: &CancellationToken, tag: &str) -> Result<()> {
        if !self.config.quiet {
            eprintln!("\nUploading image {}...", tag);
        }
        drive_push(ctx, self.toolchain.as_ref(), tag)
            .await
            .map_err(|e| e.in_phase(Phase::Push))
    }

    async fn publish(
        &self,
        ctx: &CancellationToken,
        descriptor: &DeploymentDescriptor,
        image_base: &str,
        log: &mut StateLog,
    ) -> Result<String> {
        let spec = build_image_specs_with(descriptor, image_base, &self.config.install_targets)
            .map_err(|e| e.in_phase(Phase::Spec))?;
        log.enter(BuildState::SpecBuilt);

        self.build_staged(ctx, &spec, log).await?;
        log.enter(BuildState::Built);

        self.push_image(ctx, spec.image_tag()).await?;
        log.enter(BuildState::Pushed);

        Ok(spec.image_tag().to_string())
    }

    async fn build_staged(
        &self,
        ctx: &CancellationToken,
        spec: &BuildSpec,
        log: &mut StateLog,
    ) -> Result<()> {
        let deadline = Instant::now()
            .checked_add(self.config.build_timeout())
            .ok_or_else(|| {
                KilnError::ConfigError(format!(
                    "build timeout of {}s is out of range",
                    self.config.build_timeout_secs
                ))
                .in_phase(Phase::Build)
            })?;
        let tag = spec.image_tag();

        if ctx.is_cancelled() {
            return Err(KilnError::Cancelled.in_phase(Phase::Stage));
        }

        if !self.config.quiet {
            eprintln!("Building image {}...", tag);
        }

        let options = WorkspaceOptions::from_config(&self.config);
        let workspace = Workspace::stage(spec, &options).map_err(|e| e.in_phase(Phase::Stage))?;
        log.enter(BuildState::Staged);

        let result = drive_build(ctx, self.toolchain.as_ref(), workspace.path(), tag, deadline).await;
        let path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            tracing::warn!(workspace = %path.display(), error = %e, "Failed to remove workspace");
        }

        result.map_err(|e| e.in_phase(Phase::Build))
    }
}

impl fmt::Debug for ImageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
