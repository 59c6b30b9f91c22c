use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Phase of a build invocation in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Deriving the build spec from the deployment descriptor
    Spec,
    /// Creating and populating the build workspace
    Stage,
    /// Running the external image build
    Build,
    /// Pushing the built image to its registry
    Push,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spec => write!(f, "spec"),
            Self::Stage => write!(f, "stage"),
            Self::Build => write!(f, "build"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Kiln error types
#[derive(Error, Debug)]
pub enum KilnError {
    /// Malformed deployment descriptor or image name
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Build workspace could not be created
    #[error("Failed to create workspace {}: {source}", .path.display())]
    WorkspaceCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A staged file could not be copied into the workspace
    #[error("Failed to copy {} into workspace: {source}", .path.display())]
    FileCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Build manifest could not be rendered or written
    #[error("Failed to write build manifest: {0}")]
    ManifestWrite(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// External image build failed
    #[error("Image build failed: {0}")]
    BuildError(String),

    /// External image push failed
    #[error("Image push failed: {0}")]
    PushError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// An error tagged with the build phase it occurred in
    #[error("{phase} phase failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<KilnError>,
    },
}

impl KilnError {
    /// Tag this error with the phase it occurred in.
    ///
    /// An error that already carries a phase keeps its original one.
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            Self::Phase { .. } => self,
            other => Self::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// The phase this error was tagged with, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The underlying error with any phase tagging stripped.
    pub fn root(&self) -> &KilnError {
        match self {
            Self::Phase { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for KilnError {
    fn from(err: serde_json::Error) -> Self {
        KilnError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for KilnError {
    fn from(err: serde_yaml::Error) -> Self {
        KilnError::SerializationError(err.to_string())
    }
}

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let error = KilnError::InvalidInput("deployment id too short".to_string());
        assert_eq!(error.to_string(), "Invalid input: deployment id too short");
    }

    #[test]
    fn test_workspace_create_display() {
        let error = KilnError::WorkspaceCreate {
            path: PathBuf::from("/tmp/kiln-1-abc"),
            source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists"),
        };
        assert_eq!(
            error.to_string(),
            "Failed to create workspace /tmp/kiln-1-abc: exists"
        );
    }

    #[test]
    fn test_file_copy_display_names_path() {
        let error = KilnError::FileCopy {
            path: PathBuf::from("/srv/bin/app"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(error.to_string().contains("/srv/bin/app"));
        assert!(error.to_string().contains("not found"));
    }

    #[test]
    fn test_timeout_error_display() {
        let error = KilnError::TimeoutError("image build exceeded 120s".to_string());
        assert_eq!(error.to_string(), "Timeout: image build exceeded 120s");
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(KilnError::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_build_and_push_error_display() {
        let build = KilnError::BuildError("exit status: 1".to_string());
        assert_eq!(build.to_string(), "Image build failed: exit status: 1");
        let push = KilnError::PushError("exit status: 2".to_string());
        assert_eq!(push.to_string(), "Image push failed: exit status: 2");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Spec.to_string(), "spec");
        assert_eq!(Phase::Stage.to_string(), "stage");
        assert_eq!(Phase::Build.to_string(), "build");
        assert_eq!(Phase::Push.to_string(), "push");
    }

    #[test]
    fn test_in_phase_wraps_and_displays() {
        let error = KilnError::BuildError("exit status: 1".to_string()).in_phase(Phase::Build);
        assert_eq!(error.phase(), Some(Phase::Build));
        assert_eq!(
            error.to_string(),
            "build phase failed: Image build failed: exit status: 1"
        );
        assert!(matches!(error.root(), KilnError::BuildError(_)));
    }

    #[test]
    fn test_in_phase_keeps_first_phase() {
        let error = KilnError::Cancelled
            .in_phase(Phase::Stage)
            .in_phase(Phase::Build);
        assert_eq!(error.phase(), Some(Phase::Stage));
        assert!(matches!(error.root(), KilnError::Cancelled));
    }

    #[test]
    fn test_phase_source_chain() {
        use std::error::Error as _;

        let error = KilnError::PushError("denied".to_string()).in_phase(Phase::Push);
        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "Image push failed: denied");
    }

    #[test]
    fn test_untagged_error_has_no_phase() {
        let error = KilnError::ConfigError("bad".to_string());
        assert_eq!(error.phase(), None);
        assert!(matches!(error.root(), KilnError::ConfigError(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: KilnError = io_error.into();
        assert!(matches!(error, KilnError::IoError(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let error: KilnError = result.unwrap_err().into();
        assert!(matches!(error, KilnError::SerializationError(_)));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let error: KilnError = result.unwrap_err().into();
        assert!(matches!(error, KilnError::SerializationError(_)));
    }
}
