//! KDL configuration parsing for jitrunner.
//!
//! This crate handles:
//! - System configuration (`jitrunner.kdl`) with environment overrides
//! - Rendering of the runner bootstrap buildspec

pub mod bootstrap;
pub mod error;
pub mod system;

pub use bootstrap::{BootstrapContext, render_buildspec};
pub use error::{ConfigError, ConfigResult};
pub use system::{
    BootstrapConfig, BuildConfig, DispatchConfig, GitHubSettings, QueueConfig, Role, SystemConfig,
};
