//! OCI image support for Kiln.
//!
//! - Image reference parsing and validation
//! - Build context staging, manifest generation and toolchain driving

pub mod build;
pub mod reference;

pub use build::{
    build_image_specs, build_image_specs_with, BuildSpec, BuildState, DockerCli, ImageBuilder,
    ImageToolchain, Workspace, WorkspaceOptions,
};
pub use reference::ImageReference;
