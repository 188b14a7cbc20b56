//! Artifact archiving publisher.

use buildconf_document::Document;
use buildconf_shared::{BuildConfigurationModel, Result};

use super::{JobElement, set_child_text};

const TAG: &str = "hudson.tasks.ArtifactArchiver";
const SEPARATOR: &str = ", ";

/// Archives every project's normalized artifact paths.
pub struct Artifacts;

fn artifact_list(config: &BuildConfigurationModel) -> String {
    config
        .project_to_build
        .iter()
        .flat_map(|p| p.artifacts.iter())
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

impl JobElement for Artifacts {
    fn element_tag(&self) -> &str {
        TAG
    }

    fn parent_element_tag(&self) -> &str {
        "publishers"
    }

    fn render(&self, config: &BuildConfigurationModel) -> Option<Document> {
        let artifacts = artifact_list(config);
        if artifacts.is_empty() {
            return None;
        }
        let mut doc = Document::new(TAG);
        let root = doc.root();
        doc.append_text_element(root, "artifacts", &artifacts);
        doc.append_text_element(root, "allowEmptyArchive", "false");
        doc.append_text_element(root, "onlyIfSuccessful", "false");
        doc.append_text_element(root, "fingerprint", "false");
        doc.append_text_element(root, "defaultExcludes", "true");
        doc.append_text_element(root, "caseSensitive", "true");
        Some(doc)
    }

    fn merge_into(&self, config: &BuildConfigurationModel, doc: &mut Document) -> Result<()> {
        let Some(element) = doc.find_first(TAG) else {
            return Ok(());
        };
        let artifacts = artifact_list(config);
        if artifacts.is_empty() {
            doc.remove(element);
        } else {
            set_child_text(doc, element, "artifacts", &artifacts);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "artifacts"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildconf_shared::ProjectToBuild;

    fn config(artifacts: &[&[&str]]) -> BuildConfigurationModel {
        BuildConfigurationModel {
            project_to_build: artifacts
                .iter()
                .map(|list| ProjectToBuild {
                    artifacts: list.iter().map(|a| a.to_string()).collect(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn joins_artifacts_across_projects() {
        let fragment = Artifacts
            .render(&config(&[&["a/out.zip"], &["b/x.dll", "b/y.dll"]]))
            .unwrap();
        let list = fragment.child_text(fragment.root(), "artifacts").unwrap();
        assert_eq!(list, "a/out.zip, b/x.dll, b/y.dll");
    }

    #[test]
    fn renders_nothing_without_artifacts() {
        assert!(Artifacts.render(&config(&[&[], &[" "]])).is_none());
    }

    #[test]
    fn merge_replaces_list_and_keeps_siblings() {
        let mut doc = Document::parse(
            "<project><publishers><hudson.tasks.ArtifactArchiver><artifacts>old</artifacts><fingerprint>true</fingerprint></hudson.tasks.ArtifactArchiver></publishers></project>",
        )
        .unwrap();
        Artifacts.merge_into(&config(&[&["new/a.zip"]]), &mut doc).unwrap();
        assert_eq!(
            doc.to_xml_string(),
            "<project><publishers><hudson.tasks.ArtifactArchiver><artifacts>new/a.zip</artifacts><fingerprint>true</fingerprint></hudson.tasks.ArtifactArchiver></publishers></project>"
        );
    }

    #[test]
    fn merge_removes_element_when_list_is_empty() {
        let mut doc = Document::parse(
            "<project><publishers><hudson.tasks.ArtifactArchiver><artifacts>old</artifacts></hudson.tasks.ArtifactArchiver></publishers></project>",
        )
        .unwrap();
        Artifacts.merge_into(&config(&[]), &mut doc).unwrap();
        assert_eq!(doc.to_xml_string(), "<project><publishers/></project>");
    }
}
