//! Kiln Runtime - container image build engine.
//!
//! Builds the image for a deployment from its application binary, inside a
//! private staging workspace, and publishes it to a registry through an
//! external docker-compatible toolchain.

pub mod oci;

// Re-export common types
pub use oci::{
    build_image_specs, build_image_specs_with, BuildSpec, BuildState, DockerCli, ImageBuilder,
    ImageReference, ImageToolchain, Workspace, WorkspaceOptions,
};
pub use tokio_util::sync::CancellationToken;

/// Kiln Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
