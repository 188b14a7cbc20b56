//! Persistence of build configurations.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use buildconf_shared::{BuildConfError, BuildConfigurationModel, Result};

use crate::fsutil::write_atomic;

const CONFIG_FILE_NAME: &str = "config.json";

/// Where build configurations live between compilations.
pub trait ConfigurationStore: Send + Sync {
    /// `None` when no configuration has that name.
    fn load(&self, name: &str) -> Result<Option<BuildConfigurationModel>>;
    fn save(&self, model: &BuildConfigurationModel) -> Result<()>;
    fn exists(&self, name: &str) -> Result<bool>;
    /// Names of all stored configurations, sorted.
    fn list(&self) -> Result<Vec<String>>;
    /// Returns `false` when there was nothing to delete.
    fn delete(&self, name: &str) -> Result<bool>;
}

/// One `<name>/config.json` per configuration.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, name: &str) -> Result<PathBuf> {
        if name.trim().is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(BuildConfError::validation(format!(
                "invalid configuration name `{name}`"
            )));
        }
        Ok(self.root.join(name))
    }

    fn file(&self, name: &str) -> Result<PathBuf> {
        Ok(self.dir(name)?.join(CONFIG_FILE_NAME))
    }
}

impl ConfigurationStore for JsonFileStore {
    fn load(&self, name: &str) -> Result<Option<BuildConfigurationModel>> {
        let path = self.file(name)?;
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| BuildConfError::io(&path, e))?;
        let model = serde_json::from_str(&content)
            .map_err(|e| BuildConfError::serialization(format!("{}: {e}", path.display())))?;
        Ok(Some(model))
    }

    #[instrument(skip_all, fields(name = %model.project_name))]
    fn save(&self, model: &BuildConfigurationModel) -> Result<()> {
        let path = self.file(&model.project_name)?;
        let json = serde_json::to_string_pretty(model)
            .map_err(|e| BuildConfError::serialization(e.to_string()))?;
        write_atomic(&path, &json)?;
        debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.file(name)?.is_file())
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.root).map_err(|e| BuildConfError::io(&self.root, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BuildConfError::io(&self.root, e))?;
            if entry.path().join(CONFIG_FILE_NAME).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let dir = self.dir(name)?;
        if !dir.join(CONFIG_FILE_NAME).is_file() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir).map_err(|e| BuildConfError::io(&dir, e))?;
        debug!(name, "configuration deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildconf_shared::{ConfigurationState, ProjectToBuild};

    fn temp_store() -> (PathBuf, JsonFileStore) {
        let dir = std::env::temp_dir().join(format!("bc-store-test-{}", uuid::Uuid::now_v7()));
        (dir.clone(), JsonFileStore::new(dir))
    }

    fn model(name: &str) -> BuildConfigurationModel {
        BuildConfigurationModel {
            project_name: name.into(),
            scm: Some("git".into()),
            state: ConfigurationState::Approved,
            project_to_build: vec![ProjectToBuild {
                project_url: "https://host/org/demo.git".into(),
                artifacts: vec!["./out.zip".into()],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn save_then_load() {
        let (dir, store) = temp_store();
        assert_eq!(store.load("demo").unwrap(), None);

        store.save(&model("demo")).unwrap();
        assert!(store.exists("demo").unwrap());
        let loaded = store.load("demo").unwrap().unwrap();
        assert_eq!(loaded, model("demo"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_skips_stray_files_and_directories() {
        let (dir, store) = temp_store();
        store.save(&model("beta")).unwrap();
        store.save(&model("alpha")).unwrap();
        std::fs::create_dir_all(dir.join("empty")).unwrap();
        std::fs::write(dir.join("JobConfig.xml"), "<project/>").unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha", "beta"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let (dir, store) = temp_store();
        store.save(&model("demo")).unwrap();
        assert!(store.delete("demo").unwrap());
        assert!(!store.delete("demo").unwrap());
        assert!(!store.exists("demo").unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unnamed_configuration_is_rejected() {
        let (dir, store) = temp_store();
        let err = store.save(&model("")).unwrap_err();
        assert!(matches!(err, BuildConfError::Validation { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let (dir, store) = temp_store();
        std::fs::create_dir_all(dir.join("demo")).unwrap();
        std::fs::write(dir.join("demo").join(CONFIG_FILE_NAME), "{ not json").unwrap();
        let err = store.load("demo").unwrap_err();
        assert!(matches!(err, BuildConfError::Serialization { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
