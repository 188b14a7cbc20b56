//! Build-configuration domain types.
//!
//! A [`BuildConfigurationModel`] is authored by users, persisted by the
//! configuration store and handed to the job compiler once per compilation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default branch spec used for git checkouts when a project names none.
pub const DEFAULT_BRANCH_SPEC: &str = "*/master";

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Source-control flavour declared by a build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmKind {
    None,
    Git,
    Subversion,
}

impl ScmKind {
    /// Parse a stored SCM string. Matching is case-insensitive; missing or
    /// unrecognized values map to [`ScmKind::None`].
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("git") => Self::Git,
            Some(v) if v.eq_ignore_ascii_case("subversion") => Self::Subversion,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Git => "git",
            Self::Subversion => "subversion",
        }
    }
}

/// Review lifecycle of a build configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationState {
    #[default]
    Draft,
    Updated,
    Approved,
    ForDeletion,
}

/// Configuration flavour a builder is run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigurationVariant {
    Release,
    Debug,
    /// Free-form variant described by [`BuilderConfig::user_config`].
    Other,
}

impl std::fmt::Display for ConfigurationVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Release => "RELEASE",
            Self::Debug => "DEBUG",
            Self::Other => "OTHER",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// BuilderConfig / ProjectToBuild
// ---------------------------------------------------------------------------

/// One builder invocation for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Builder identifier (e.g. `msbuild`, `maven`).
    pub builder: String,
    /// Target platform.
    pub platform: String,
    /// Raw arguments passed through to the builder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_args: Option<String>,
    /// Variants to build; empty means "builder defaults".
    #[serde(default)]
    pub configs: Vec<ConfigurationVariant>,
    /// User configuration, only meaningful for [`ConfigurationVariant::Other`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_config: Option<String>,
}

/// A repository checked out and built as part of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectToBuild {
    /// Repository URL.
    pub project_url: String,
    /// Local checkout directory override (empty = derive from the URL).
    #[serde(default)]
    pub local_directory_path: String,
    /// Build file path relative to the checkout.
    #[serde(default)]
    pub file_to_build: String,
    /// Artifact globs/paths to archive.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Files carrying version information.
    #[serde(default)]
    pub version_files: Vec<String>,
    /// Builders, in execution order.
    #[serde(default)]
    pub builders: Vec<BuilderConfig>,
    /// Credentials identifier used for checkout.
    #[serde(default)]
    pub credentials: String,
    /// Branch spec for git checkouts (empty = [`DEFAULT_BRANCH_SPEC`]).
    #[serde(default)]
    pub branch_name: String,
}

impl ProjectToBuild {
    /// Branch spec to check out.
    pub fn branch_spec(&self) -> &str {
        if self.branch_name.trim().is_empty() {
            DEFAULT_BRANCH_SPEC
        } else {
            &self.branch_name
        }
    }
}

// ---------------------------------------------------------------------------
// BuildConfigurationModel
// ---------------------------------------------------------------------------

/// A user-authored build configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfigurationModel {
    /// Unique project name; the job name is derived from it.
    pub project_name: String,
    /// Stored SCM kind string, parsed with [`ScmKind::parse_lenient`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm: Option<String>,
    #[serde(default)]
    pub project_to_build: Vec<ProjectToBuild>,
    /// Script identifiers run by the build agent.
    #[serde(default)]
    pub scripts: Vec<String>,
    /// Version-file match pattern.
    #[serde(default)]
    pub reg_exp: String,
    #[serde(default)]
    pub state: ConfigurationState,
    /// Mailer recipients for build results, whitespace separated.
    #[serde(default)]
    pub email: String,
    /// Addresses told about lifecycle changes, whitespace separated.
    #[serde(default)]
    pub config_email: String,
    /// Set once a job has been generated from this configuration.
    #[serde(default)]
    pub job_update: bool,
    /// Node labels the job is restricted to.
    #[serde(default)]
    pub build_machine_configuration: Vec<String>,
    /// Cron spec for SCM polling.
    #[serde(default)]
    pub poll_scm_trigger: String,
    /// Cron spec for periodic builds.
    #[serde(default)]
    pub build_periodically_trigger: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub rejection_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BuildConfigurationModel {
    /// Parsed SCM kind.
    pub fn scm_kind(&self) -> ScmKind {
        ScmKind::parse_lenient(self.scm.as_deref())
    }

    /// True when any project declares at least one builder, meaning the
    /// external build agent must be invoked by the job.
    pub fn uses_build_agent(&self) -> bool {
        self.project_to_build.iter().any(|p| !p.builders.is_empty())
    }

    /// Lifecycle notification recipients as a comma-separated list.
    pub fn config_email_recipients(&self) -> String {
        self.config_email.split_whitespace().collect::<Vec<_>>().join(",")
    }

    /// Stamp the configuration with the current time.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
