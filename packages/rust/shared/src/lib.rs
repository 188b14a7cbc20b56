//! Shared types, error model, and configuration for buildconf.
//!
//! This crate is the foundation depended on by all other buildconf crates.
//! It provides:
//! - [`BuildConfError`]: the unified error type
//! - Domain types ([`BuildConfigurationModel`], [`ProjectToBuild`], [`BuilderConfig`])
//! - Configuration ([`AppConfig`], [`CompilerConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CompilerConfig, InstanceConfig, NotificationConfig, config_dir, config_file_path,
    expand_home, init_config, load_config, load_config_from, validate_notifications,
};
pub use error::{BuildConfError, Result};
pub use types::{
    BuildConfigurationModel, BuilderConfig, ConfigurationState, ConfigurationVariant,
    DEFAULT_BRANCH_SPEC, ProjectToBuild, ScmKind,
};
