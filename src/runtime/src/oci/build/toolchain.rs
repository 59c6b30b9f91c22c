//! External image toolchain.
//!
//! The build engine only needs two verbs from a container toolchain: build a
//! context directory into a tag, and push a tag. [`DockerCli`] provides them
//! by running a docker-compatible CLI with its output streamed straight to
//! the caller's console.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use kiln_core::config::{KilnConfig, DEFAULT_PROGRAM};
use kiln_core::error::{KilnError, Result};

/// Black-box build and push capability.
///
/// Dropping a returned future must stop any external work it started.
#[async_trait]
pub trait ImageToolchain: Send + Sync {
    /// Build the image in `context_dir` and tag it `tag`.
    async fn build(&self, context_dir: &Path, tag: &str) -> Result<()>;

    /// Push `tag` to its registry.
    async fn push(&self, tag: &str) -> Result<()>;
}

/// Docker-compatible CLI (`docker`, `podman`, `nerdctl`, ...).
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &KilnConfig) -> Self {
        Self::new(config.program.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command with stdio wired to the parent and killed when dropped.
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, verb: &str) -> std::result::Result<ExitStatus, String> {
        let mut child = cmd.spawn().map_err(|e| {
            format!(
                "failed to spawn {} {}: {} (is {} installed?)",
                self.program, verb, e, self.program
            )
        })?;

        tracing::debug!(program = %self.program, verb, pid = child.id(), "Toolchain process started");

        child
            .wait()
            .await
            .map_err(|e| format!("failed to wait for {} {}: {}", self.program, verb, e))
    }
}

#[async_trait]
impl ImageToolchain for DockerCli {
    async fn build(&self, context_dir: &Path, tag: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("build").arg(context_dir).arg("-t").arg(tag);

        let status = self.run(cmd, "build").await.map_err(KilnError::BuildError)?;
        if !status.success() {
            return Err(KilnError::BuildError(format!(
                "{} build exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }

    async fn push(&self, tag: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("push").arg(tag);

        let status = self.run(cmd, "push").await.map_err(KilnError::PushError)?;
        if !status.success() {
            return Err(KilnError::PushError(format!(
                "{} push exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}
