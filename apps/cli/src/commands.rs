//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use buildconf_core::{
    CompileProgress, CompileReport, ConfigurationService, JobCompiler, JsonFileStore, LogTransport,
    Notifier, sanitize_job_name,
};
use buildconf_shared::{
    AppConfig, BuildConfigurationModel, CompilerConfig, init_config, load_config,
    validate_notifications,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// buildconf: compile build configurations into CI job definitions.
#[derive(Parser)]
#[command(
    name = "buildconf",
    version,
    about = "Compile declarative build configurations into CI job definitions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Job runner home directory (overrides [instance].root_dir).
    #[arg(long, env = "BUILDCONF_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create or update the job for a stored build configuration.
    Compile {
        /// Configuration (project) name.
        name: String,

        /// Store this JSON configuration under `name` before compiling.
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Delete the job generated for a configuration.
    Delete {
        /// Configuration (project) name.
        name: String,
    },

    /// Mark a configuration for deletion.
    MarkForDeletion {
        name: String,
    },

    /// Bring a configuration marked for deletion back.
    Restore {
        name: String,
    },

    /// Remove a stored configuration for good.
    Purge {
        name: String,
    },

    /// List stored build configurations.
    List,

    /// List existing jobs.
    Jobs,

    /// Print the job name a project name maps to.
    Sanitize {
        name: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults and install the job template.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "buildconf=info",
        1 => "buildconf=debug",
        _ => "buildconf=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let root = cli.root.as_deref();
    match cli.command {
        Command::Compile { name, from } => {
            let instance = Instance::open(root)?;
            let result = cmd_compile(&instance, &name, from.as_deref());
            instance.shutdown().await;
            result
        }
        Command::Delete { name } => {
            let instance = Instance::open(root)?;
            let result = cmd_delete(&instance, &name);
            instance.shutdown().await;
            result
        }
        Command::MarkForDeletion { name } => {
            let instance = Instance::open(root)?;
            let result: Result<()> = instance
                .service
                .mark_for_deletion(&name)
                .map(|marked| {
                    if marked {
                        println!("Marked '{name}' for deletion.");
                    } else {
                        println!("'{name}' is already marked for deletion.");
                    }
                })
                .map_err(Into::into);
            instance.shutdown().await;
            result
        }
        Command::Restore { name } => {
            let instance = Instance::open(root)?;
            let result: Result<()> = instance.service.restore(&name).map_err(Into::into);
            instance.shutdown().await;
            result.map(|()| println!("Restored '{name}'."))
        }
        Command::Purge { name } => {
            let instance = Instance::open(root)?;
            let result: Result<()> =
                instance.service.delete_permanently(&name).map_err(Into::into);
            instance.shutdown().await;
            result.map(|()| println!("Deleted configuration '{name}'."))
        }
        Command::List => {
            let instance = Instance::open(root)?;
            let result = cmd_list(&instance);
            instance.shutdown().await;
            result
        }
        Command::Jobs => {
            let instance = Instance::open(root)?;
            let result = cmd_jobs(&instance);
            instance.shutdown().await;
            result
        }
        Command::Sanitize { name } => {
            println!("{}", sanitize_job_name(&name));
            Ok(())
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(root),
            ConfigAction::Show => cmd_config_show(root),
        },
    }
}

// ---------------------------------------------------------------------------
// Instance wiring
// ---------------------------------------------------------------------------

fn resolve_config(config: &AppConfig, root: Option<&Path>) -> CompilerConfig {
    match root {
        Some(root) => CompilerConfig::with_root(&config.instance, root),
        None => CompilerConfig::from(config),
    }
}

/// Configuration service plus the notification worker backing it.
struct Instance {
    service: ConfigurationService,
    worker: Option<JoinHandle<()>>,
}

impl Instance {
    fn open(root: Option<&Path>) -> Result<Self> {
        let config = load_config()?;
        validate_notifications(&config)?;
        let compiler_config = resolve_config(&config, root);
        info!(root = %compiler_config.root_dir.display(), "opening instance");

        let (notifier, worker) = if config.notifications.enabled {
            let (notifier, worker) =
                Notifier::spawn(LogTransport::new(config.notifications.from.clone()));
            (notifier, Some(worker))
        } else {
            (Notifier::disabled(), None)
        };

        let store = JsonFileStore::new(compiler_config.configurations_dir.clone());
        let service = ConfigurationService::new(
            Box::new(store),
            JobCompiler::with_file_repository(compiler_config),
            notifier,
            config.notifications.admin_email.clone(),
        );
        Ok(Self { service, worker })
    }

    /// Drop the service and wait for queued notifications to drain.
    async fn shutdown(self) {
        let Self { service, worker } = self;
        drop(service);
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "notification worker failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_compile(instance: &Instance, name: &str, from: Option<&Path>) -> Result<()> {
    if let Some(path) = from {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
        let mut model: BuildConfigurationModel = serde_json::from_str(&content)
            .map_err(|e| eyre!("invalid configuration '{}': {e}", path.display()))?;
        model.project_name = name.to_string();
        instance.service.store().save(&model)?;
        info!(name, path = %path.display(), "stored configuration");
    }

    let progress = CliProgress::new();
    let report = match instance.service.create_job(name, &progress) {
        Ok(report) => report,
        Err(e) => {
            progress.spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    println!();
    println!("  Job {} successfully!", report.action);
    println!("  Job:        {}", report.job_name);
    println!("  Agent:      {:?}", report.agent_scripts);
    match &report.descriptor_path {
        Some(path) => println!("  Descriptor: {}", path.display()),
        None => println!("  Descriptor: not written (see log)"),
    }
    println!("  SHA-256:    {}", report.document_sha256);
    println!("  Time:       {:.2}s", report.elapsed.as_secs_f64());
    println!();
    Ok(())
}

fn cmd_delete(instance: &Instance, name: &str) -> Result<()> {
    if instance.service.delete_job(name)? {
        println!("Deleted job '{}'.", sanitize_job_name(name));
    } else {
        println!("No job for '{name}'.");
    }
    Ok(())
}

fn cmd_list(instance: &Instance) -> Result<()> {
    let store = instance.service.store();
    let names = store.list()?;
    if names.is_empty() {
        println!("No build configurations.");
        return Ok(());
    }
    for name in names {
        match store.load(&name)? {
            Some(model) => println!(
                "{name:<32} {:<14} {}",
                format!("{:?}", model.state),
                if model.job_update { "job generated" } else { "" }
            ),
            None => println!("{name}"),
        }
    }
    Ok(())
}

fn cmd_jobs(instance: &Instance) -> Result<()> {
    for name in instance.service.compiler().repository().job_names()? {
        println!("{name}");
    }
    Ok(())
}

fn cmd_config_init(root: Option<&Path>) -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());

    let config = load_config()?;
    let compiler = JobCompiler::with_file_repository(resolve_config(&config, root));
    let template = &compiler.config().template_path;
    if compiler.install_template()? {
        println!("Job template installed at: {}", template.display());
    } else {
        println!("Job template kept at: {}", template.display());
    }
    Ok(())
}

fn cmd_config_show(root: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");

    let resolved = resolve_config(&config, root);
    println!("# resolved paths");
    println!("# template:       {}", resolved.template_path.display());
    println!("# jobs:           {}", resolved.jobs_dir.display());
    println!("# user content:   {}", resolved.user_content_dir.display());
    println!("# configurations: {}", resolved.configurations_dir.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl CompileProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _report: &CompileReport) {
        self.spinner.finish_and_clear();
    }
}
