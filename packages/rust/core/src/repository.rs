//! Job repository adapter.
//!
//! The job runner owns the live job definitions; the compiler only talks to
//! it through [`JobRepository`]. [`FileJobRepository`] stores each job as
//! `<jobs_dir>/<name>/config.xml`, the layout of a job runner home.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use buildconf_document::Document;
use buildconf_shared::{BuildConfError, Result};

use crate::fsutil::write_atomic;

const JOB_FILE_NAME: &str = "config.xml";

/// Access to the job runner's job definitions.
pub trait JobRepository: Send + Sync {
    /// Names of every existing job, sorted.
    fn job_names(&self) -> Result<Vec<String>>;

    fn job_exists(&self, name: &str) -> Result<bool> {
        Ok(self.job_names()?.iter().any(|n| n == name))
    }

    /// Current live definition of a job.
    fn read_job_document(&self, name: &str) -> Result<Document>;

    /// Create a new job. Fails if the job exists or `xml` does not parse.
    fn create_from_document(&self, name: &str, xml: &str) -> Result<()>;

    /// Replace a job's live definition. Fails if the job is missing or
    /// `xml` does not parse.
    fn update_from_document(&self, name: &str, xml: &str) -> Result<()>;

    /// Delete a job. Returns `false` when there was nothing to delete.
    fn delete_job(&self, name: &str) -> Result<bool>;
}

/// Jobs stored as directories under a jobs root.
#[derive(Debug, Clone)]
pub struct FileJobRepository {
    jobs_dir: PathBuf,
}

impl FileJobRepository {
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
        }
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    fn job_dir(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(BuildConfError::repository(format!("invalid job name `{name}`")));
        }
        Ok(self.jobs_dir.join(name))
    }

    fn job_file(&self, name: &str) -> Result<PathBuf> {
        Ok(self.job_dir(name)?.join(JOB_FILE_NAME))
    }

    fn check_document(name: &str, xml: &str) -> Result<()> {
        Document::parse(xml).map(|_| ()).map_err(|e| {
            BuildConfError::repository(format!("rejected definition for `{name}`: {e}"))
        })
    }
}

impl JobRepository for FileJobRepository {
    fn job_names(&self) -> Result<Vec<String>> {
        if !self.jobs_dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            std::fs::read_dir(&self.jobs_dir).map_err(|e| BuildConfError::io(&self.jobs_dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BuildConfError::io(&self.jobs_dir, e))?;
            if entry.path().join(JOB_FILE_NAME).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn job_exists(&self, name: &str) -> Result<bool> {
        Ok(self.job_file(name)?.is_file())
    }

    fn read_job_document(&self, name: &str) -> Result<Document> {
        let path = self.job_file(name)?;
        if !path.is_file() {
            return Err(BuildConfError::JobNotFound {
                name: name.to_string(),
            });
        }
        Document::from_file(&path)
    }

    fn create_from_document(&self, name: &str, xml: &str) -> Result<()> {
        let path = self.job_file(name)?;
        if path.exists() {
            return Err(BuildConfError::repository(format!("job `{name}` already exists")));
        }
        Self::check_document(name, xml)?;
        write_atomic(&path, xml)?;
        info!(job = name, "job created");
        Ok(())
    }

    fn update_from_document(&self, name: &str, xml: &str) -> Result<()> {
        let path = self.job_file(name)?;
        if !path.is_file() {
            return Err(BuildConfError::repository(format!("job `{name}` does not exist")));
        }
        Self::check_document(name, xml)?;
        write_atomic(&path, xml)?;
        info!(job = name, "job updated");
        Ok(())
    }

    fn delete_job(&self, name: &str) -> Result<bool> {
        let dir = self.job_dir(name)?;
        if !dir.join(JOB_FILE_NAME).is_file() {
            debug!(job = name, "no job to delete");
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir).map_err(|e| BuildConfError::io(&dir, e))?;
        info!(job = name, "job deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_repo() -> (PathBuf, FileJobRepository) {
        let dir = std::env::temp_dir().join(format!("bc-repo-test-{}", uuid::Uuid::now_v7()));
        let repo = FileJobRepository::new(dir.join("jobs"));
        (dir, repo)
    }

    #[test]
    fn missing_jobs_dir_lists_nothing() {
        let (dir, repo) = temp_repo();
        assert!(repo.job_names().unwrap().is_empty());
        assert!(!repo.job_exists("demo").unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn create_read_update_delete() {
        let (dir, repo) = temp_repo();

        repo.create_from_document("demo", "<project/>").unwrap();
        repo.create_from_document("alpha", "<project/>").unwrap();
        assert_eq!(repo.job_names().unwrap(), vec!["alpha", "demo"]);
        assert!(repo.job_exists("demo").unwrap());

        repo.update_from_document("demo", "<project><disabled>true</disabled></project>")
            .unwrap();
        let doc = repo.read_job_document("demo").unwrap();
        assert!(doc.find_first("disabled").is_some());

        assert!(repo.delete_job("demo").unwrap());
        assert!(!repo.delete_job("demo").unwrap());
        assert_eq!(repo.job_names().unwrap(), vec!["alpha"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn create_rejects_existing_and_update_rejects_missing() {
        let (dir, repo) = temp_repo();
        repo.create_from_document("demo", "<project/>").unwrap();

        let err = repo.create_from_document("demo", "<project/>").unwrap_err();
        assert!(matches!(err, BuildConfError::RepositoryAdapter { .. }));
        let err = repo.update_from_document("other", "<project/>").unwrap_err();
        assert!(matches!(err, BuildConfError::RepositoryAdapter { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unparsable_definitions_are_rejected() {
        let (dir, repo) = temp_repo();
        let err = repo.create_from_document("demo", "<project>").unwrap_err();
        assert!(matches!(err, BuildConfError::RepositoryAdapter { .. }));
        assert!(!repo.job_exists("demo").unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn read_missing_job_is_not_found() {
        let (dir, repo) = temp_repo();
        let err = repo.read_job_document("ghost").unwrap_err();
        assert!(matches!(err, BuildConfError::JobNotFound { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_like_names_are_rejected() {
        let (dir, repo) = temp_repo();
        assert!(repo.create_from_document("../escape", "<project/>").is_err());
        assert!(repo.job_exists("..").is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
