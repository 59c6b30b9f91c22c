//! Build workspace staging.
//!
//! A workspace is a private, uniquely named directory holding the build
//! context for exactly one image build: the staged files (by base name) and
//! the rendered manifest. It is removed when the handle is dropped, on every
//! exit path.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use kiln_core::config::{KilnConfig, DEFAULT_WORKSPACE_PREFIX};
use kiln_core::error::{KilnError, Result};

use super::spec::BuildSpec;
use super::template::{render_validated, MANIFEST_FILENAME};

/// Where and how workspaces are named.
#[derive(Debug, Clone)]
pub struct WorkspaceOptions {
    /// Parent directory of all workspaces
    pub root: PathBuf,
    /// Directory name prefix
    pub prefix: String,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir(),
            prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
        }
    }
}

impl WorkspaceOptions {
    pub fn from_config(config: &KilnConfig) -> Self {
        Self {
            root: config.temp_root(),
            prefix: config.workspace_prefix.clone(),
        }
    }
}

/// A staged build context. Removed recursively on drop.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl Workspace {
    /// Create an empty workspace directory.
    ///
    /// The name is `<prefix><pid>-` followed by a random suffix. The
    /// directory is readable by its owner only.
    pub fn create(options: &WorkspaceOptions) -> Result<Self> {
        let prefix = format!("{}{}-", options.prefix, std::process::id());

        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o700));
        }
        let dir = builder
            .tempdir_in(&options.root)
            .map_err(|source| KilnError::WorkspaceCreate {
                path: options.root.join(&prefix),
                source,
            })?;

        let path = dir.path().to_path_buf();
        tracing::debug!(workspace = %path.display(), "Workspace created");

        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    /// Create a workspace and populate it with the build spec's files and manifest.
    ///
    /// On any failure the partially staged workspace is removed before the
    /// error is returned.
    pub fn stage(spec: &BuildSpec, options: &WorkspaceOptions) -> Result<Self> {
        let workspace = Self::create(options)?;

        for file in spec.staged_files() {
            workspace.copy_in(file)?;
        }
        workspace.write_manifest(spec.install_targets())?;

        tracing::info!(
            workspace = %workspace.path.display(),
            files = spec.staged_files().len(),
            install_targets = spec.install_targets().len(),
            "Workspace staged"
        );

        Ok(workspace)
    }

    /// Workspace directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the build manifest inside the workspace.
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILENAME)
    }

    /// Copy `source` into the workspace under its base name only.
    ///
    /// Directory components of `source` never reach the destination path, so
    /// `../` segments or absolute paths cannot escape the workspace.
    pub fn copy_in(&self, source: &Path) -> Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| KilnError::FileCopy {
            path: source.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no file name",
            ),
        })?;
        let dest = self.path.join(file_name);

        if dest.symlink_metadata().is_ok() {
            return Err(KilnError::FileCopy {
                path: source.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!(
                        "another staged file is already named {}",
                        Path::new(file_name).display()
                    ),
                ),
            });
        }

        let bytes = std::fs::copy(source, &dest).map_err(|e| KilnError::FileCopy {
            path: source.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            source = %source.display(),
            dest = %dest.display(),
            bytes,
            "Staged file"
        );

        Ok(dest)
    }

    /// Render the manifest for `install_targets` and write it.
    pub fn write_manifest(&self, install_targets: &[String]) -> Result<PathBuf> {
        let content = render_validated(install_targets)?;
        let manifest_path = self.manifest_path();

        if manifest_path.symlink_metadata().is_ok() {
            return Err(KilnError::ManifestWrite(format!(
                "{} already exists in the workspace",
                MANIFEST_FILENAME
            )));
        }

        std::fs::write(&manifest_path, content).map_err(|e| {
            KilnError::ManifestWrite(format!(
                "failed to write {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        Ok(manifest_path)
    }

    /// Remove the workspace now and report the outcome.
    pub fn close(mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
            tracing::debug!(workspace = %self.path.display(), "Workspace removed");
        }
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match dir.close() {
            Ok(()) => {
                tracing::debug!(workspace = %self.path.display(), "Workspace removed");
            }
            Err(e) => {
                tracing::warn!(
                    workspace = %self.path.display(),
                    error = %e,
                    "Failed to remove workspace"
                );
            }
        }
    }
}
