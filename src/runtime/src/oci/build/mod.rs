//! Container image build support.
//!
//! Derives a build spec from a deployment, stages it into a private
//! workspace with a generated Dockerfile, and drives an external toolchain
//! to build and push the image.
//!
//! # Flow
//!
//! ```text
//! DeploymentDescriptor ─► BuildSpec ─► Workspace ─► build ─► push ─► image tag
//! ```

pub mod dockerfile;
pub mod driver;
pub mod engine;
pub mod spec;
pub mod template;
pub mod toolchain;
pub mod workspace;

pub use dockerfile::{Dockerfile, Instruction};
pub use driver::{drive_build, drive_push};
pub use engine::{BuildState, ImageBuilder};
pub use spec::{build_image_specs, build_image_specs_with, BuildSpec};
pub use template::{render_manifest, MANIFEST_FILENAME};
pub use toolchain::{DockerCli, ImageToolchain};
pub use workspace::{Workspace, WorkspaceOptions};
