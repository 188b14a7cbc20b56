//! Application configuration for buildconf.
//!
//! User config lives at `~/.buildconf/buildconf.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildConfError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "buildconf.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".buildconf";

// ---------------------------------------------------------------------------
// Config structs (matching buildconf.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job runner instance layout.
    #[serde(default)]
    pub instance: InstanceConfig,

    /// Lifecycle notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// `[instance]` section. Relative paths resolve against `root_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Job runner home directory.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Canonical job template.
    #[serde(default = "default_template_path")]
    pub template_path: String,

    /// Directory holding one sub-directory per job.
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: String,

    /// Shared content directory the agent descriptors are written to.
    #[serde(default = "default_user_content_dir")]
    pub user_content_dir: String,

    /// Directory holding persisted build configurations.
    #[serde(default = "default_configurations_dir")]
    pub configurations_dir: String,

    /// Scratch file the job document is serialized to before hand-off,
    /// created inside `configurations_dir`.
    #[serde(default = "default_scratch_file_name")]
    pub scratch_file_name: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            template_path: default_template_path(),
            jobs_dir: default_jobs_dir(),
            user_content_dir: default_user_content_dir(),
            configurations_dir: default_configurations_dir(),
            scratch_file_name: default_scratch_file_name(),
        }
    }
}

fn default_root_dir() -> String {
    "~/.jenkins".into()
}
fn default_template_path() -> String {
    "plugins/build-configurator/job/JobTemplate.xml".into()
}
fn default_jobs_dir() -> String {
    "jobs".into()
}
fn default_user_content_dir() -> String {
    "userContent".into()
}
fn default_configurations_dir() -> String {
    "plugins/BuildConfiguration".into()
}
fn default_scratch_file_name() -> String {
    "JobConfig.xml".into()
}

/// `[notifications]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether lifecycle notifications are dispatched at all.
    #[serde(default)]
    pub enabled: bool,

    /// Administrator address; destination of lifecycle notifications.
    #[serde(default)]
    pub admin_email: String,

    /// Sender address.
    #[serde(default)]
    pub from: String,
}

// ---------------------------------------------------------------------------
// Compiler config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration with every path resolved.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub root_dir: PathBuf,
    pub template_path: PathBuf,
    pub jobs_dir: PathBuf,
    pub user_content_dir: PathBuf,
    pub configurations_dir: PathBuf,
    pub scratch_file: PathBuf,
}

impl CompilerConfig {
    /// Resolve every configured path against `root_dir`.
    pub fn with_root(instance: &InstanceConfig, root_dir: &Path) -> Self {
        let resolve = |p: &str| {
            let path = expand_home(p);
            if path.is_absolute() {
                path
            } else {
                root_dir.join(path)
            }
        };
        let configurations_dir = resolve(&instance.configurations_dir);
        Self {
            root_dir: root_dir.to_path_buf(),
            template_path: resolve(&instance.template_path),
            jobs_dir: resolve(&instance.jobs_dir),
            user_content_dir: resolve(&instance.user_content_dir),
            scratch_file: configurations_dir.join(&instance.scratch_file_name),
            configurations_dir,
        }
    }
}

impl From<&AppConfig> for CompilerConfig {
    fn from(config: &AppConfig) -> Self {
        let root = expand_home(&config.instance.root_dir);
        Self::with_root(&config.instance, &root)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.buildconf/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BuildConfError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.buildconf/buildconf.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BuildConfError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BuildConfError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BuildConfError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BuildConfError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BuildConfError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that notifications, when enabled, have somewhere to go.
pub fn validate_notifications(config: &AppConfig) -> Result<()> {
    let n = &config.notifications;
    if n.enabled && !n.admin_email.contains('@') {
        return Err(BuildConfError::config(
            "notifications are enabled but [notifications].admin_email is not an address",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("root_dir"));
        assert!(toml_str.contains("JobTemplate.xml"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.instance.jobs_dir, "jobs");
        assert!(!parsed.notifications.enabled);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r#"
[instance]
root_dir = "/srv/jenkins"

[notifications]
enabled = true
admin_email = "admin@example.com"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.instance.root_dir, "/srv/jenkins");
        assert_eq!(config.instance.user_content_dir, "userContent");
        assert!(validate_notifications(&config).is_ok());
    }

    #[test]
    fn compiler_config_resolves_against_root() {
        let mut app = AppConfig::default();
        app.instance.root_dir = "/srv/jenkins".into();
        let compiler = CompilerConfig::from(&app);
        assert_eq!(compiler.jobs_dir, PathBuf::from("/srv/jenkins/jobs"));
        assert_eq!(
            compiler.template_path,
            PathBuf::from("/srv/jenkins/plugins/build-configurator/job/JobTemplate.xml")
        );
        assert_eq!(
            compiler.scratch_file,
            PathBuf::from("/srv/jenkins/plugins/BuildConfiguration/JobConfig.xml")
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let mut instance = InstanceConfig::default();
        instance.template_path = "/opt/templates/Job.xml".into();
        let compiler = CompilerConfig::with_root(&instance, Path::new("/srv/jenkins"));
        assert_eq!(compiler.template_path, PathBuf::from("/opt/templates/Job.xml"));
    }

    #[test]
    fn enabled_notifications_need_an_admin() {
        let mut config = AppConfig::default();
        config.notifications.enabled = true;
        let err = validate_notifications(&config).unwrap_err();
        assert!(err.to_string().contains("admin_email"));
    }
}
