//! Agent descriptor: the projection of a build configuration read by the
//! external build agent. It is written next to the job runner's shared
//! content and never read back here.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, instrument};

use buildconf_shared::{
    BuildConfError, BuildConfigurationModel, ConfigurationVariant, ProjectToBuild, Result,
};

use crate::fsutil::write_atomic;
use crate::paths::sanitize_job_name;

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Root of the descriptor document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename = "job")]
pub struct JobDescriptor {
    pub name: String,
    pub scripts: Scripts,
    pub projects: Projects,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Scripts {
    #[serde(rename = "script")]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Projects {
    #[serde(rename = "project")]
    pub items: Vec<ProjectDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
    #[serde(rename = "@pathToFile")]
    pub path_to_file: String,
    #[serde(rename = "@localDirectory", skip_serializing_if = "Option::is_none")]
    pub local_directory: Option<String>,
    pub repository: RepositoryDescriptor,
    #[serde(rename = "pathToArtifacts")]
    pub path_to_artifacts: FileList,
    #[serde(rename = "versionFiles")]
    pub version_files: VersionFiles,
    pub configs: Configs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileList {
    #[serde(rename = "file")]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionFiles {
    #[serde(rename = "@isVersionFile")]
    pub is_version_file: bool,
    #[serde(rename = "file")]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Configs {
    #[serde(rename = "config")]
    pub items: Vec<ConfigDescriptor>,
}

/// One builder run. `variant` is absent when the builder has no variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub builder: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder_args: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_config: Option<String>,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project a (normalized) configuration into a descriptor.
pub fn build_descriptor(config: &BuildConfigurationModel) -> JobDescriptor {
    let kind = config.scm_kind().as_str().to_string();
    JobDescriptor {
        name: sanitize_job_name(&config.project_name),
        scripts: Scripts {
            items: config.scripts.clone(),
        },
        projects: Projects {
            items: config
                .project_to_build
                .iter()
                .map(|project| project_descriptor(project, &kind))
                .collect(),
        },
    }
}

fn project_descriptor(project: &ProjectToBuild, scm_kind: &str) -> ProjectDescriptor {
    let local_directory =
        (!project.local_directory_path.is_empty()).then(|| project.local_directory_path.clone());
    ProjectDescriptor {
        path_to_file: project.file_to_build.clone(),
        local_directory,
        repository: RepositoryDescriptor {
            kind: scm_kind.to_string(),
            url: project.project_url.clone(),
        },
        path_to_artifacts: FileList {
            files: project.artifacts.clone(),
        },
        version_files: VersionFiles {
            is_version_file: !project.version_files.is_empty(),
            files: project.version_files.clone(),
        },
        configs: Configs {
            items: job_configurations(project),
        },
    }
}

/// One entry per builder without variants, otherwise one per variant.
fn job_configurations(project: &ProjectToBuild) -> Vec<ConfigDescriptor> {
    let mut configs = Vec::new();
    for builder in &project.builders {
        if builder.configs.is_empty() {
            configs.push(ConfigDescriptor {
                variant: None,
                builder: builder.builder.clone(),
                platform: builder.platform.clone(),
                builder_args: builder.builder_args.clone().filter(|a| !a.is_empty()),
                user_config: None,
            });
            continue;
        }
        for variant in &builder.configs {
            let user_config = match variant {
                ConfigurationVariant::Other => builder.user_config.clone(),
                _ => None,
            };
            configs.push(ConfigDescriptor {
                variant: Some(variant.to_string()),
                builder: builder.builder.clone(),
                platform: builder.platform.clone(),
                builder_args: builder.builder_args.clone(),
                user_config,
            });
        }
    }
    configs
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Serialize with an XML header and two-space indentation.
pub fn to_xml(descriptor: &JobDescriptor) -> Result<String> {
    let mut body = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 2);
    descriptor
        .serialize(serializer)
        .map_err(|e| BuildConfError::serialization(format!("agent descriptor: {e}")))?;
    Ok(format!("{XML_HEADER}{body}"))
}

/// Write `<dir>/<name>.xml`. Failures surface as
/// [`BuildConfError::DescriptorWrite`].
#[instrument(skip_all, fields(job = %descriptor.name))]
pub fn write_descriptor(dir: &Path, descriptor: &JobDescriptor) -> Result<PathBuf> {
    let path = dir.join(format!("{}.xml", descriptor.name));
    let xml = to_xml(descriptor).map_err(|e| BuildConfError::DescriptorWrite {
        path: path.clone(),
        message: e.to_string(),
    })?;
    write_atomic(&path, &xml).map_err(|e| BuildConfError::DescriptorWrite {
        path: path.clone(),
        message: e.to_string(),
    })?;
    debug!(path = %path.display(), "wrote agent descriptor");
    Ok(path)
}
