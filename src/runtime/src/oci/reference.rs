//! OCI image reference parsing.
//!
//! Splits references like `registry.example.com:5000/team/app:abcdef12` into
//! registry, repository, tag and digest so composed image tags can be checked
//! before anything is built.

use kiln_core::error::{KilnError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "team/app")
    pub repository: String,
    /// Tag, if one was given explicitly
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123..."), if one was given
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Unlike a pull, no default tag is filled in: `tag` is `None` unless the
    /// reference names one.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(KilnError::InvalidInput("empty image reference".to_string()));
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(KilnError::InvalidInput(format!(
                "image reference '{}' contains whitespace",
                reference
            )));
        }

        let (name_tag, digest) = match reference.rsplit_once('@') {
            Some((name, digest)) => {
                if !digest.contains(':') {
                    return Err(KilnError::InvalidInput(format!(
                        "invalid digest in reference '{}': expected algorithm:hex",
                        reference
                    )));
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        let (name, tag) = split_tag(name_tag);
        if tag.is_some_and(str::is_empty) {
            return Err(KilnError::InvalidInput(format!(
                "empty tag in reference '{}'",
                reference
            )));
        }

        let (registry, repository) = split_registry_repository(name)?;

        Ok(ImageReference {
            registry,
            repository,
            tag: tag.map(str::to_string),
            digest,
        })
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

/// Split `name[:tag]`, where only a colon after the last `/` starts a tag.
fn split_tag(name_tag: &str) -> (&str, Option<&str>) {
    let last_component_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
    match name_tag[last_component_start..].rfind(':') {
        Some(colon) => {
            let colon = last_component_start + colon;
            (&name_tag[..colon], Some(&name_tag[colon + 1..]))
        }
        None => (name_tag, None),
    }
}

/// Split a name into registry and repository components.
fn split_registry_repository(name: &str) -> Result<(String, String)> {
    // The first component is a registry if it looks like a hostname
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            if rest.is_empty() {
                return Err(KilnError::InvalidInput(format!(
                    "empty repository in reference '{}'",
                    name
                )));
            }
            return Ok((first.to_string(), rest.to_string()));
        }
    }

    if name.is_empty() || name.contains(':') || name.split('/').any(str::is_empty) {
        return Err(KilnError::InvalidInput(format!(
            "invalid repository name '{}'",
            name
        )));
    }

    let repository = if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{}", name)
    };

    Ok((DEFAULT_REGISTRY.to_string(), repository))
}
