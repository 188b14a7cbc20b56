//! Source-control descriptor, one variant per checkout strategy.

use buildconf_document::{Document, NodeId};
use buildconf_shared::{BuildConfigurationModel, ProjectToBuild, Result, ScmKind};
use tracing::debug;

use super::JobElement;

const TAG: &str = "scm";

/// Source-control generator chosen for a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScmElement {
    /// No checkout.
    None,
    /// One Subversion location per project.
    Subversion,
    /// A single git repository.
    Git,
    /// Several git repositories checked out side by side.
    MultiGit,
}

/// Pick the generator for a configuration's SCM kind and project count.
pub fn choose_scm(config: &BuildConfigurationModel) -> ScmElement {
    match config.scm_kind() {
        ScmKind::None => ScmElement::None,
        ScmKind::Subversion => ScmElement::Subversion,
        ScmKind::Git if config.project_to_build.len() == 1 => ScmElement::Git,
        ScmKind::Git => ScmElement::MultiGit,
    }
}

impl ScmElement {
    fn build(&self, config: &BuildConfigurationModel) -> Document {
        let mut doc = Document::new(TAG);
        let root = doc.root();
        match self {
            Self::None => doc.set_attr(root, "class", "hudson.scm.NullSCM"),
            Self::Subversion => subversion(&mut doc, root, &config.project_to_build),
            Self::Git => {
                doc.set_attr(root, "class", "hudson.plugins.git.GitSCM");
                doc.set_attr(root, "plugin", "git");
                if let Some(project) = config.project_to_build.first() {
                    git_body(&mut doc, root, project);
                }
            }
            Self::MultiGit => {
                doc.set_attr(root, "class", "org.jenkinsci.plugins.multiplescms.MultiSCM");
                doc.set_attr(root, "plugin", "multiple-scms");
                let scms = doc.append_element(root, "scms");
                for project in &config.project_to_build {
                    let git = doc.append_element(scms, "hudson.plugins.git.GitSCM");
                    doc.set_attr(git, "plugin", "git");
                    git_body(&mut doc, git, project);
                }
            }
        }
        doc
    }
}

fn subversion(doc: &mut Document, root: NodeId, projects: &[ProjectToBuild]) {
    doc.set_attr(root, "class", "hudson.scm.SubversionSCM");
    doc.set_attr(root, "plugin", "subversion");

    let locations = doc.append_element(root, "locations");
    for project in projects {
        let location = doc.append_element(locations, "hudson.scm.SubversionSCM_-ModuleLocation");
        doc.append_text_element(location, "remote", &project.project_url);
        doc.append_text_element(location, "credentialsId", &project.credentials);
        let local = if project.local_directory_path.is_empty() {
            "."
        } else {
            project.local_directory_path.as_str()
        };
        doc.append_text_element(location, "local", local);
        doc.append_text_element(location, "depthOption", "infinity");
        doc.append_text_element(location, "ignoreExternalsOption", "true");
    }

    for empty in [
        "excludedRegions",
        "includedRegions",
        "excludedUsers",
        "excludedRevprop",
        "excludedCommitMessages",
    ] {
        doc.append_element(root, empty);
    }
    let updater = doc.append_element(root, "workspaceUpdater");
    doc.set_attr(updater, "class", "hudson.scm.subversion.UpdateUpdater");
    doc.append_text_element(root, "ignoreDirPropChanges", "false");
    doc.append_text_element(root, "filterChangelog", "false");
}

fn git_body(doc: &mut Document, parent: NodeId, project: &ProjectToBuild) {
    doc.append_text_element(parent, "configVersion", "2");

    let remotes = doc.append_element(parent, "userRemoteConfigs");
    let remote = doc.append_element(remotes, "hudson.plugins.git.UserRemoteConfig");
    doc.append_text_element(remote, "url", &project.project_url);
    if !project.credentials.is_empty() {
        doc.append_text_element(remote, "credentialsId", &project.credentials);
    }

    let branches = doc.append_element(parent, "branches");
    let branch = doc.append_element(branches, "hudson.plugins.git.BranchSpec");
    doc.append_text_element(branch, "name", project.branch_spec());

    doc.append_text_element(parent, "doGenerateSubmoduleConfigurations", "false");
    let submodules = doc.append_element(parent, "submoduleCfg");
    doc.set_attr(submodules, "class", "list");

    let extensions = doc.append_element(parent, "extensions");
    if !project.local_directory_path.is_empty() {
        let target = doc.append_element(
            extensions,
            "hudson.plugins.git.extensions.impl.RelativeTargetDirectory",
        );
        doc.append_text_element(target, "relativeTargetDir", &project.local_directory_path);
    }
}

impl JobElement for ScmElement {
    fn element_tag(&self) -> &str {
        TAG
    }

    fn parent_element_tag(&self) -> &str {
        "project"
    }

    fn render(&self, config: &BuildConfigurationModel) -> Option<Document> {
        Some(self.build(config))
    }

    /// The whole descriptor is regenerated and swapped in place.
    fn merge_into(&self, config: &BuildConfigurationModel, doc: &mut Document) -> Result<()> {
        let Some(existing) = doc.find_first(TAG) else {
            return Ok(());
        };
        let fresh = self.build(config);
        let node = doc.import_subtree(&fresh, fresh.root());
        doc.replace(existing, node);
        debug!(variant = self.name(), "replaced scm element");
        Ok(())
    }

    fn name(&self) -> &str {
        match self {
            Self::None => "scm/none",
            Self::Subversion => "scm/subversion",
            Self::Git => "scm/git",
            Self::MultiGit => "scm/multi-git",
        }
    }
}
