//! Kiln Core - Foundational Types
//!
//! Types shared between the image build engine and its callers: the error
//! taxonomy, build phases, the deployment descriptor, configuration and
//! logging bootstrap.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod log;

// Re-export commonly used types
pub use config::{KilnConfig, LogLevel};
pub use descriptor::DeploymentDescriptor;
pub use error::{KilnError, Phase, Result};

/// Kiln version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
