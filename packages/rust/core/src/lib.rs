//! Job compilation and configuration lifecycle for buildconf.
//!
//! This crate turns a [`BuildConfigurationModel`](buildconf_shared::BuildConfigurationModel)
//! into a job definition: path normalization, element generation,
//! agent-step reconciliation, the agent descriptor, and the hand-off to a
//! [`JobRepository`]. The lifecycle layer wraps it with a configuration
//! store and notifications.

pub mod agent_script;
pub mod compiler;
pub mod descriptor;
pub mod elements;
mod fsutil;
pub mod lifecycle;
pub mod lock;
pub mod notify;
pub mod paths;
pub mod repository;
pub mod store;

pub use compiler::{
    CompileProgress, CompileReport, DEFAULT_TEMPLATE, FILE_TO_COPY_PATH, JobAction, JobCompiler,
    SilentProgress,
};
pub use lifecycle::ConfigurationService;
pub use lock::JobLocks;
pub use notify::{LifecycleEvent, LogTransport, MailTransport, MessageInfo, Notifier};
pub use paths::sanitize_job_name;
pub use repository::{FileJobRepository, JobRepository};
pub use store::{ConfigurationStore, JsonFileStore};
