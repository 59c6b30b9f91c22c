//! Deployment descriptor consumed by the image builder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The subset of a deployment that image building needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    /// Unique deployment id (typically a UUID); its first 8 characters
    /// become the image tag.
    pub id: String,
    /// Application binary copied into the image.
    pub binary_path: PathBuf,
    /// Additional artifacts copied next to the binary.
    #[serde(default)]
    pub extra_files: Vec<PathBuf>,
}

impl DeploymentDescriptor {
    /// Create a descriptor for a single application binary.
    pub fn new(id: impl Into<String>, binary_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            binary_path: binary_path.into(),
            extra_files: Vec::new(),
        }
    }

    /// Add an extra artifact to stage alongside the binary.
    pub fn with_extra_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_files.push(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_no_extra_files() {
        let dep = DeploymentDescriptor::new("abcdef1234567890", "/tmp/app");
        assert_eq!(dep.id, "abcdef1234567890");
        assert_eq!(dep.binary_path, PathBuf::from("/tmp/app"));
        assert!(dep.extra_files.is_empty());
    }

    #[test]
    fn test_with_extra_file_preserves_order() {
        let dep = DeploymentDescriptor::new("abcdef1234567890", "/tmp/app")
            .with_extra_file("/etc/app/config.toml")
            .with_extra_file("/etc/app/weights.bin");
        assert_eq!(
            dep.extra_files,
            vec![
                PathBuf::from("/etc/app/config.toml"),
                PathBuf::from("/etc/app/weights.bin"),
            ]
        );
    }

    #[test]
    fn test_deserialize_without_extra_files() {
        let json = r#"{"id":"0123456789abcdef","binary_path":"/srv/app"}"#;
        let dep: DeploymentDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(dep.binary_path, PathBuf::from("/srv/app"));
        assert!(dep.extra_files.is_empty());
    }
}
