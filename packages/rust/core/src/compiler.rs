//! Job compilation: build configuration in, job definition out.
//!
//! 1. Sanitize the job name and take its lock
//! 2. Normalize project paths (restored afterwards)
//! 3. Load the live job, or the template for a new one
//! 4. Apply the element generators
//! 5. Reconcile the agent steps
//! 6. Point the copied-file declaration at the agent descriptor
//! 7. Write the agent descriptor (non-fatal)
//! 8. Write the scratch file and hand the document to the job repository

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use buildconf_document::Document;
use buildconf_shared::{BuildConfError, BuildConfigurationModel, CompilerConfig, Result};

use crate::agent_script::{self, AgentScriptAction};
use crate::descriptor;
use crate::elements::ElementRegistry;
use crate::fsutil::{sha256_hex, write_atomic};
use crate::lock::JobLocks;
use crate::paths::{self, PathSnapshot, sanitize_job_name};
use crate::repository::{FileJobRepository, JobRepository};

/// Text node naming the file the build wrapper copies to the build node.
pub const FILE_TO_COPY_PATH: &str =
    "/project/buildWrappers/com.michelin.cio.hudson.plugins.copytoslave.CopyToSlaveBuildWrapper/includes";

/// Job template shipped with the crate.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/JobTemplate.xml");

/// Whether compilation created a job or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Created,
    Updated,
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Result of one compilation.
#[derive(Debug)]
pub struct CompileReport {
    pub job_name: String,
    pub action: JobAction,
    /// The job definition as handed to the repository.
    pub document: Document,
    /// SHA-256 of the serialized job definition.
    pub document_sha256: String,
    pub agent_scripts: AgentScriptAction,
    /// `None` when the descriptor could not be written.
    pub descriptor_path: Option<PathBuf>,
    pub scratch_file: PathBuf,
    pub compiled_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Progress callback for compilation.
pub trait CompileProgress: Send + Sync {
    /// Called when a new phase starts.
    fn phase(&self, name: &str);
    /// Called once when compilation succeeds.
    fn done(&self, report: &CompileReport);
}

/// No-op progress reporter.
pub struct SilentProgress;

impl CompileProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _report: &CompileReport) {}
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

pub struct JobCompiler {
    config: CompilerConfig,
    repository: Box<dyn JobRepository>,
    locks: JobLocks,
}

impl JobCompiler {
    pub fn new(config: CompilerConfig, repository: Box<dyn JobRepository>) -> Self {
        Self {
            config,
            repository,
            locks: JobLocks::new(),
        }
    }

    /// Compiler backed by the jobs directory of `config`.
    pub fn with_file_repository(config: CompilerConfig) -> Self {
        let repository = FileJobRepository::new(config.jobs_dir.clone());
        Self::new(config, Box::new(repository))
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn repository(&self) -> &dyn JobRepository {
        self.repository.as_ref()
    }

    /// Load the canonical job template.
    pub fn load_template(&self) -> Result<Document> {
        let path = &self.config.template_path;
        if !path.is_file() {
            return Err(BuildConfError::TemplateNotFound { path: path.clone() });
        }
        Document::from_file(path)
    }

    /// Write [`DEFAULT_TEMPLATE`] to the template path unless a template is
    /// already there. Returns whether it was written.
    pub fn install_template(&self) -> Result<bool> {
        let path = &self.config.template_path;
        if path.exists() {
            return Ok(false);
        }
        write_atomic(path, DEFAULT_TEMPLATE)?;
        info!(path = %path.display(), "installed job template");
        Ok(true)
    }

    /// Compile `model` into a created or updated job.
    ///
    /// On return, successful or not, the model's artifact and version-file
    /// lists are the ones it came in with. On success `job_update` is set;
    /// persisting the model is up to the caller.
    #[instrument(skip_all, fields(project = %model.project_name))]
    pub fn compile(
        &self,
        model: &mut BuildConfigurationModel,
        progress: &dyn CompileProgress,
    ) -> Result<CompileReport> {
        let job_name = sanitize_job_name(&model.project_name);
        if job_name.is_empty() {
            return Err(BuildConfError::validation("project name is empty"));
        }

        self.locks.with_lock(&job_name, || {
            let snapshot = PathSnapshot::capture(&model.project_to_build);
            paths::normalize_projects(&mut model.project_to_build);
            let result = self.compile_locked(&job_name, model, progress);
            snapshot.restore(&mut model.project_to_build);

            let report = result?;
            model.job_update = true;
            progress.done(&report);
            Ok(report)
        })
    }

    fn compile_locked(
        &self,
        job_name: &str,
        model: &BuildConfigurationModel,
        progress: &dyn CompileProgress,
    ) -> Result<CompileReport> {
        let start = Instant::now();

        progress.phase("Loading job document");
        let is_update = self.repository.job_exists(job_name)?;
        let mut doc = if is_update {
            self.repository.read_job_document(job_name)?
        } else {
            self.load_template()?
        };
        info!(job = job_name, is_update, "loaded job document");

        progress.phase("Generating job elements");
        ElementRegistry::for_config(model).apply(&mut doc, model)?;

        progress.phase("Reconciling agent steps");
        let agent_scripts = agent_script::reconcile(
            &mut doc,
            model.uses_build_agent(),
            is_update,
            || self.load_template(),
        )?;
        set_file_to_copy(&mut doc, job_name)?;

        progress.phase("Writing agent descriptor");
        let descriptor_path = match descriptor::write_descriptor(
            &self.config.user_content_dir,
            &descriptor::build_descriptor(model),
        ) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(job = job_name, error = %e, "agent descriptor not written");
                None
            }
        };

        let xml = doc.to_xml_string();
        write_atomic(&self.config.scratch_file, &xml)?;

        let action = if is_update {
            progress.phase("Updating job");
            self.repository.update_from_document(job_name, &xml)?;
            JobAction::Updated
        } else {
            progress.phase("Creating job");
            self.repository.create_from_document(job_name, &xml)?;
            JobAction::Created
        };

        let elapsed = start.elapsed();
        info!(
            job = job_name,
            %action,
            ?agent_scripts,
            elapsed_ms = elapsed.as_millis() as u64,
            "job compiled"
        );

        Ok(CompileReport {
            job_name: job_name.to_string(),
            action,
            document_sha256: sha256_hex(&xml),
            document: doc,
            agent_scripts,
            descriptor_path,
            scratch_file: self.config.scratch_file.clone(),
            compiled_at: Utc::now(),
            elapsed,
        })
    }

    /// Delete the job generated for `project_name`. Returns `false` when no
    /// such job exists.
    #[instrument(skip(self))]
    pub fn delete_job(&self, project_name: &str) -> Result<bool> {
        let job_name = sanitize_job_name(project_name);
        if job_name.is_empty() {
            return Err(BuildConfError::validation("project name is empty"));
        }
        self.locks
            .with_lock(&job_name, || self.repository.delete_job(&job_name))
    }
}

fn set_file_to_copy(doc: &mut Document, job_name: &str) -> Result<()> {
    let includes = doc
        .find_all(FILE_TO_COPY_PATH)?
        .first()
        .copied()
        .ok_or_else(|| BuildConfError::MissingAnchor {
            path: FILE_TO_COPY_PATH.to_string(),
        })?;
    doc.set_text(includes, &format!("{job_name}.xml"));
    Ok(())
}
