use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KilnError, Result};

/// Default deadline for staging plus image build: 120 seconds.
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 120;

/// Upper bound for the build deadline: one day.
pub const MAX_BUILD_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Default external toolchain program.
pub const DEFAULT_PROGRAM: &str = "docker";

/// Default workspace directory name prefix.
pub const DEFAULT_WORKSPACE_PREFIX: &str = "kiln-";

/// Packages installed inside the build stage of every image by default.
pub const DEFAULT_INSTALL_TARGETS: &[&str] = &["github.com/kiln-deploy/kiln-kube/cmd/kiln-kube@latest"];

/// Image build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    /// Container toolchain executable (must understand `build` and `push`)
    pub program: String,

    /// Deadline in seconds covering workspace staging and image build
    pub build_timeout_secs: u64,

    /// Directory under which workspaces are created (None = system temp dir)
    pub temp_root: Option<PathBuf>,

    /// Prefix of workspace directory names
    pub workspace_prefix: String,

    /// Build-tool package identifiers installed in the build stage
    pub install_targets: Vec<String>,

    /// Suppress progress messages on stderr
    pub quiet: bool,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            temp_root: None,
            workspace_prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
            install_targets: DEFAULT_INSTALL_TARGETS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            quiet: false,
            log_level: LogLevel::Info,
        }
    }
}

impl KilnConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| KilnError::ConfigError(format!("invalid YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| KilnError::ConfigError(format!("invalid JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, choosing the format by extension.
    ///
    /// `.json` files are parsed as JSON, everything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KilnError::ConfigError(format!(
                "failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    /// Check the configuration for values the build engine cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(KilnError::ConfigError(
                "program must not be empty".to_string(),
            ));
        }
        if self.build_timeout_secs == 0 {
            return Err(KilnError::ConfigError(
                "build_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.build_timeout_secs > MAX_BUILD_TIMEOUT_SECS {
            return Err(KilnError::ConfigError(format!(
                "build_timeout_secs must be at most {}",
                MAX_BUILD_TIMEOUT_SECS
            )));
        }
        if self.workspace_prefix.is_empty() {
            return Err(KilnError::ConfigError(
                "workspace_prefix must not be empty".to_string(),
            ));
        }
        if self
            .workspace_prefix
            .chars()
            .any(|c| std::path::is_separator(c) || c == '.')
        {
            return Err(KilnError::ConfigError(format!(
                "workspace_prefix '{}' must be a plain name",
                self.workspace_prefix
            )));
        }
        Ok(())
    }

    /// Build deadline as a duration.
    pub fn build_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.build_timeout_secs)
    }

    /// Root directory for workspaces.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}
