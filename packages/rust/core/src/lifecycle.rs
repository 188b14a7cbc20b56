//! Configuration lifecycle: generating and deleting jobs, marking for
//! deletion, restoring, and permanent removal.

use tracing::{info, instrument};

use buildconf_shared::{BuildConfError, BuildConfigurationModel, ConfigurationState, Result};

use crate::compiler::{CompileProgress, CompileReport, JobCompiler};
use crate::notify::{LifecycleEvent, Notifier, status_message};
use crate::store::ConfigurationStore;

/// Store, compiler and notifier working on one instance.
pub struct ConfigurationService {
    store: Box<dyn ConfigurationStore>,
    compiler: JobCompiler,
    notifier: Notifier,
    admin_email: String,
}

impl ConfigurationService {
    pub fn new(
        store: Box<dyn ConfigurationStore>,
        compiler: JobCompiler,
        notifier: Notifier,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            compiler,
            notifier,
            admin_email: admin_email.into(),
        }
    }

    pub fn store(&self) -> &dyn ConfigurationStore {
        self.store.as_ref()
    }

    pub fn compiler(&self) -> &JobCompiler {
        &self.compiler
    }

    fn load(&self, name: &str) -> Result<BuildConfigurationModel> {
        self.store
            .load(name)?
            .ok_or_else(|| BuildConfError::validation(format!("no build configuration named `{name}`")))
    }

    fn notify(&self, model: &BuildConfigurationModel, event: LifecycleEvent) {
        self.notifier
            .send(status_message(model, event, &self.admin_email));
    }

    /// Compile the stored configuration and persist it flagged as generated.
    #[instrument(skip(self, progress))]
    pub fn create_job(&self, name: &str, progress: &dyn CompileProgress) -> Result<CompileReport> {
        let mut model = self.load(name)?;
        let report = self.compiler.compile(&mut model, progress)?;
        self.store.save(&model)?;
        Ok(report)
    }

    /// Delete the job generated for `name`. An approved configuration also
    /// loses its generated flag.
    #[instrument(skip(self))]
    pub fn delete_job(&self, name: &str) -> Result<bool> {
        let deleted = self.compiler.delete_job(name)?;
        if let Some(mut model) = self.store.load(name)? {
            if model.state == ConfigurationState::Approved {
                model.job_update = false;
                self.store.save(&model)?;
            }
        }
        Ok(deleted)
    }

    /// Returns `false` when the configuration was already marked.
    #[instrument(skip(self))]
    pub fn mark_for_deletion(&self, name: &str) -> Result<bool> {
        let mut model = self.load(name)?;
        if model.state == ConfigurationState::ForDeletion {
            return Ok(false);
        }
        model.state = ConfigurationState::ForDeletion;
        model.touch();
        self.store.save(&model)?;
        info!(name, "configuration marked for deletion");
        self.notify(&model, LifecycleEvent::MarkedForDeletion);
        Ok(true)
    }

    #[instrument(skip(self))]
    pub fn restore(&self, name: &str) -> Result<()> {
        let mut model = self.load(name)?;
        model.state = ConfigurationState::Updated;
        self.store.save(&model)?;
        info!(name, "configuration restored");
        self.notify(&model, LifecycleEvent::Restored);
        Ok(())
    }

    /// Remove the stored configuration. The generated job, if any, stays.
    #[instrument(skip(self))]
    pub fn delete_permanently(&self, name: &str) -> Result<()> {
        let model = self.load(name)?;
        self.store.delete(name)?;
        info!(name, "configuration deleted permanently");
        self.notify(&model, LifecycleEvent::DeletedPermanently);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use buildconf_shared::{CompilerConfig, ProjectToBuild};

    use crate::compiler::SilentProgress;
    use crate::notify::{MailTransport, MessageInfo};
    use crate::store::JsonFileStore;

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<MessageInfo>>>);

    impl MailTransport for Recording {
        fn deliver(&self, message: &MessageInfo) -> Result<()> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
        fn name(&self) -> &str {
            "recording"
        }
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("bc-lifecycle-test-{}", uuid::Uuid::now_v7()))
    }

    fn service(root: &Path, notifier: Notifier) -> ConfigurationService {
        let config = CompilerConfig {
            root_dir: root.to_path_buf(),
            template_path: PathBuf::from("templates/JobTemplate.xml"),
            jobs_dir: root.join("jobs"),
            user_content_dir: root.join("userContent"),
            configurations_dir: root.join("configurations"),
            scratch_file: root.join("configurations").join("JobConfig.xml"),
        };
        let store = JsonFileStore::new(config.configurations_dir.clone());
        ConfigurationService::new(
            Box::new(store),
            JobCompiler::with_file_repository(config),
            notifier,
            "admin@example.com",
        )
    }

    fn model(state: ConfigurationState) -> BuildConfigurationModel {
        BuildConfigurationModel {
            project_name: "demo".into(),
            scm: Some("git".into()),
            state,
            config_email: "dev@example.com".into(),
            project_to_build: vec![ProjectToBuild {
                project_url: "https://host/org/demo.git".into(),
                artifacts: vec!["./out.zip".into()],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn create_job_persists_generated_flag() {
        let root = temp_root();
        let svc = service(&root, Notifier::disabled());
        svc.store().save(&model(ConfigurationState::Approved)).unwrap();

        svc.create_job("demo", &SilentProgress).unwrap();
        let stored = svc.store().load("demo").unwrap().unwrap();
        assert!(stored.job_update);
        assert_eq!(stored.project_to_build[0].artifacts, vec!["./out.zip"]);
        assert!(svc.compiler().repository().job_exists("demo").unwrap());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn delete_job_clears_flag_only_when_approved() {
        let root = temp_root();
        let svc = service(&root, Notifier::disabled());

        svc.store().save(&model(ConfigurationState::Approved)).unwrap();
        svc.create_job("demo", &SilentProgress).unwrap();
        assert!(svc.delete_job("demo").unwrap());
        assert!(!svc.store().load("demo").unwrap().unwrap().job_update);

        svc.store().save(&model(ConfigurationState::Draft)).unwrap();
        svc.create_job("demo", &SilentProgress).unwrap();
        assert!(svc.delete_job("demo").unwrap());
        assert!(svc.store().load("demo").unwrap().unwrap().job_update);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unknown_configuration_is_rejected() {
        let root = temp_root();
        let svc = service(&root, Notifier::disabled());
        let err = svc.create_job("ghost", &SilentProgress).unwrap_err();
        assert!(matches!(err, BuildConfError::Validation { .. }));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn lifecycle_changes_notify() {
        let root = temp_root();
        let transport = Recording::default();
        let delivered = transport.0.clone();
        let (notifier, handle) = Notifier::spawn(transport);
        let svc = service(&root, notifier);
        svc.store().save(&model(ConfigurationState::Approved)).unwrap();

        assert!(svc.mark_for_deletion("demo").unwrap());
        assert!(!svc.mark_for_deletion("demo").unwrap());
        let stored = svc.store().load("demo").unwrap().unwrap();
        assert_eq!(stored.state, ConfigurationState::ForDeletion);
        assert!(stored.updated_at.is_some());

        svc.restore("demo").unwrap();
        assert_eq!(
            svc.store().load("demo").unwrap().unwrap().state,
            ConfigurationState::Updated
        );

        svc.delete_permanently("demo").unwrap();
        assert!(!svc.store().exists("demo").unwrap());

        drop(svc);
        handle.await.unwrap();

        let delivered = delivered.lock().unwrap();
        let bodies: Vec<&str> = delivered.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies.len(), 3);
        assert!(bodies[0].contains("marked for deletion"));
        assert!(bodies[1].contains("restored"));
        assert!(bodies[2].contains("deleted permanently"));
        assert!(delivered.iter().all(|m| m.cc == "dev@example.com"));
        assert!(delivered.iter().all(|m| m.destination == "admin@example.com"));

        let _ = std::fs::remove_dir_all(&root);
    }
}
