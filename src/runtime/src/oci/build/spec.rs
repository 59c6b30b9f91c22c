//! Image build specification derived from a deployment.

use std::path::PathBuf;

use kiln_core::config::DEFAULT_INSTALL_TARGETS;
use kiln_core::error::{KilnError, Result};
use kiln_core::DeploymentDescriptor;

use crate::oci::reference::ImageReference;

/// Number of deployment id characters used as the image tag.
pub const TAG_ID_LEN: usize = 8;

/// Everything needed to build one image. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    image_tag: String,
    staged_files: Vec<PathBuf>,
    install_targets: Vec<String>,
}

impl BuildSpec {
    /// Full image reference to build and push (`<base>:<id prefix>`).
    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }

    /// Files copied into the build context, in order.
    pub fn staged_files(&self) -> &[PathBuf] {
        &self.staged_files
    }

    /// Packages installed in the builder stage, in order.
    pub fn install_targets(&self) -> &[String] {
        &self.install_targets
    }
}

/// Build the image specs for a deployment using the default install targets.
pub fn build_image_specs(descriptor: &DeploymentDescriptor, image_base: &str) -> Result<BuildSpec> {
    let targets: Vec<String> = DEFAULT_INSTALL_TARGETS.iter().map(|s| s.to_string()).collect();
    build_image_specs_with(descriptor, image_base, &targets)
}

/// Build the image specs for a deployment with explicit install targets.
///
/// Any id of at least [`TAG_ID_LEN`] characters yields `<base>:<id prefix>`,
/// provided the prefix only uses image tag characters (`[A-Za-z0-9_.-]`).
/// Other ids, such as `ab/cdefghij`, are rejected as `InvalidInput` rather
/// than producing an unusable reference.
pub fn build_image_specs_with(
    descriptor: &DeploymentDescriptor,
    image_base: &str,
    install_targets: &[String],
) -> Result<BuildSpec> {
    let image_base = image_base.trim();
    if image_base.is_empty() {
        return Err(KilnError::InvalidInput(
            "image base name must not be empty".to_string(),
        ));
    }

    let id_prefix = tag_from_id(&descriptor.id)?;
    let image_tag = format!("{}:{}", image_base, id_prefix);

    // The base must not already carry a tag or digest.
    let reference = ImageReference::parse(&image_tag)?;
    if reference.digest.is_some() || reference.tag.as_deref() != Some(id_prefix) {
        return Err(KilnError::InvalidInput(format!(
            "image base name '{}' must not include a tag or digest",
            image_base
        )));
    }

    for target in install_targets {
        if target.is_empty() || target.contains(char::is_whitespace) {
            return Err(KilnError::InvalidInput(format!(
                "invalid install target {:?}",
                target
            )));
        }
    }

    let mut staged_files = vec![descriptor.binary_path.clone()];
    staged_files.extend(descriptor.extra_files.iter().cloned());
    if staged_files.iter().any(|p| p.as_os_str().is_empty()) {
        return Err(KilnError::InvalidInput(
            "staged file path must not be empty".to_string(),
        ));
    }

    Ok(BuildSpec {
        image_tag,
        staged_files,
        install_targets: install_targets.to_vec(),
    })
}

/// First [`TAG_ID_LEN`] characters of a deployment id, checked to be usable
/// as an image tag.
fn tag_from_id(id: &str) -> Result<&str> {
    let end = match id.char_indices().nth(TAG_ID_LEN) {
        Some((idx, _)) => idx,
        None if id.chars().count() == TAG_ID_LEN => id.len(),
        None => {
            return Err(KilnError::InvalidInput(format!(
                "deployment id '{}' is shorter than {} characters",
                id, TAG_ID_LEN
            )))
        }
    };

    let prefix = &id[..end];
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return Err(KilnError::InvalidInput(format!(
            "deployment id prefix '{}' is not a valid image tag",
            prefix
        )));
    }

    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> DeploymentDescriptor {
        DeploymentDescriptor::new(id, "/tmp/app")
    }

    #[test]
    fn test_tag_uses_first_eight_characters() {
        let spec = build_image_specs(&descriptor("abcdef1234567890"), "myrepo/app").unwrap();
        assert_eq!(spec.image_tag(), "myrepo/app:abcdef12");
    }

    #[test]
    fn test_tag_with_uuid_id() {
        let spec = build_image_specs(
            &descriptor("3f2b8c1a-9d4e-4b7a-8c2d-1e5f6a7b8c9d"),
            "ghcr.io/org/app",
        )
        .unwrap();
        assert_eq!(spec.image_tag(), "ghcr.io/org/app:3f2b8c1a");
    }

    #[test]
    fn test_id_of_exactly_eight_characters() {
        let spec = build_image_specs(&descriptor("01234567"), "app").unwrap();
        assert_eq!(spec.image_tag(), "app:01234567");
    }

    #[test]
    fn test_tag_is_base_and_id_prefix_for_tag_safe_ids() {
        // Holds for every id whose first eight characters are tag characters;
        // other ids are rejected below.
        for id in ["abcdef1234567890", "ABC_def.-xyz", "00000000", "a-b_c.d9zzzz"] {
            let spec = build_image_specs(&descriptor(id), "myrepo/app").unwrap();
            let prefix: String = id.chars().take(TAG_ID_LEN).collect();
            assert_eq!(spec.image_tag(), format!("myrepo/app:{}", prefix));
        }
    }

    #[test]
    fn test_id_prefix_outside_tag_charset_rejected() {
        for id in ["ab/cdefghij", "abc:defghij", "abc defghij", "abcdefg@hij"] {
            let err = build_image_specs(&descriptor(id), "myrepo/app").unwrap_err();
            assert!(matches!(err, KilnError::InvalidInput(_)), "id {:?}", id);
        }
    }

    #[test]
    fn test_short_id_is_invalid_input() {
        for id in ["", "a", "abcdef1"] {
            let err = build_image_specs(&descriptor(id), "myrepo/app").unwrap_err();
            assert!(matches!(err, KilnError::InvalidInput(_)), "id {:?}", id);
        }
    }

    #[test]
    fn test_multibyte_id_counts_characters() {
        let err = build_image_specs(&descriptor("ééééééé"), "app").unwrap_err();
        assert!(err.to_string().contains("shorter"));

        let err = build_image_specs(&descriptor("éééééééé-more"), "app").unwrap_err();
        assert!(err.to_string().contains("not a valid image tag"));
    }

    #[test]
    fn test_registry_with_port() {
        let spec = build_image_specs(&descriptor("abcdef1234567890"), "localhost:5000/app").unwrap();
        assert_eq!(spec.image_tag(), "localhost:5000/app:abcdef12");
    }

    #[test]
    fn test_base_with_tag_or_digest_rejected() {
        assert!(build_image_specs(&descriptor("abcdef1234567890"), "nginx:1.25").is_err());
        assert!(build_image_specs(&descriptor("abcdef1234567890"), "app@sha256:abc").is_err());
        assert!(build_image_specs(&descriptor("abcdef1234567890"), "  ").is_err());
    }

    #[test]
    fn test_staged_files_binary_first_then_extras() {
        let dep = descriptor("abcdef1234567890").with_extra_file("/etc/app.toml");
        let spec = build_image_specs(&dep, "myrepo/app").unwrap();
        assert_eq!(
            spec.staged_files(),
            &[PathBuf::from("/tmp/app"), PathBuf::from("/etc/app.toml")]
        );
    }

    #[test]
    fn test_default_install_targets() {
        let spec = build_image_specs(&descriptor("abcdef1234567890"), "myrepo/app").unwrap();
        assert_eq!(spec.install_targets().len(), DEFAULT_INSTALL_TARGETS.len());
        assert_eq!(spec.install_targets()[0], DEFAULT_INSTALL_TARGETS[0]);
    }

    #[test]
    fn test_explicit_install_targets() {
        let spec = build_image_specs_with(&descriptor("abcdef1234567890"), "myrepo/app", &[]).unwrap();
        assert!(spec.install_targets().is_empty());

        let bad = vec!["example.com/tool@latest && rm -rf /".to_string()];
        let err = build_image_specs_with(&descriptor("abcdef1234567890"), "myrepo/app", &bad)
            .unwrap_err();
        assert!(matches!(err, KilnError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_binary_path_rejected() {
        let dep = DeploymentDescriptor::new("abcdef1234567890", "");
        assert!(build_image_specs(&dep, "myrepo/app").is_err());
    }
}
