//! Job-aspect generators and the locate-or-create-then-merge algorithm.
//!
//! Each [`JobElement`] owns one tag of the job document. On a fresh
//! document it renders a fragment that is grafted under its parent group;
//! when the tag already exists it merges into the live element instead, so
//! hand-edited content around it survives recompilation.

mod artifacts;
mod assigned_node;
mod mailer;
mod scm;
mod triggers;
mod version_file;

use buildconf_document::{Document, NodeId};
use buildconf_shared::{BuildConfigurationModel, Result};
use tracing::debug;

pub use artifacts::Artifacts;
pub use assigned_node::AssignedNode;
pub use mailer::Mailer;
pub use scm::{ScmElement, choose_scm};
pub use triggers::{PeriodicTrigger, PollScmTrigger};
pub use version_file::VersionFilePattern;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// One aspect of a job document.
pub trait JobElement: Send + Sync {
    /// Tag this generator owns.
    fn element_tag(&self) -> &str;

    /// Tag of the group the element lives under.
    fn parent_element_tag(&self) -> &str;

    /// Render the element as a standalone fragment whose root is
    /// [`element_tag`](Self::element_tag). `None` means "nothing to emit".
    fn render(&self, config: &BuildConfigurationModel) -> Option<Document>;

    /// Merge into a document that already contains the element.
    fn merge_into(&self, config: &BuildConfigurationModel, doc: &mut Document) -> Result<()>;

    /// Rendered fragment as text; empty when there is nothing to emit.
    fn render_xml(&self, config: &BuildConfigurationModel) -> String {
        self.render(config)
            .map(|fragment| fragment.to_xml_string())
            .unwrap_or_default()
    }

    /// Checkbox behaviour, for elements that toggle a marker.
    fn as_checkbox(&self) -> Option<&dyn CheckBox> {
        None
    }

    /// Human-readable generator name for tracing.
    fn name(&self) -> &str;
}

/// A job option backed by a marker element elsewhere in the document.
pub trait CheckBox {
    fn check(&self, doc: &mut Document);
    fn uncheck(&self, doc: &mut Document);
}

// ---------------------------------------------------------------------------
// Locate-or-create-then-merge
// ---------------------------------------------------------------------------

/// Apply one generator to `doc`.
///
/// Absent tag: make sure the parent group exists (appended to the root if
/// missing), toggle the checkbox marker if any, then graft the rendered
/// fragment under the parent. Present tag: delegate to
/// [`JobElement::merge_into`].
pub fn set_element(
    element: &dyn JobElement,
    doc: &mut Document,
    config: &BuildConfigurationModel,
) -> Result<()> {
    if doc.find_first(element.element_tag()).is_some() {
        debug!(element = element.name(), "merging into existing element");
        return element.merge_into(config, doc);
    }

    let parent_tag = element.parent_element_tag();
    let parent = match doc.find_first(parent_tag) {
        Some(parent) => parent,
        None => {
            let root = doc.root();
            doc.append_element(root, parent_tag)
        }
    };

    let fragment = element.render(config);
    if let Some(checkbox) = element.as_checkbox() {
        match fragment {
            Some(_) => checkbox.check(doc),
            None => checkbox.uncheck(doc),
        }
    }

    match fragment {
        Some(fragment) => {
            let node = doc.import_subtree(&fragment, fragment.root());
            doc.append_child(parent, node);
            debug!(element = element.name(), "inserted element");
        }
        None => debug!(element = element.name(), "nothing to insert"),
    }
    Ok(())
}

/// Replace the text of `parent/child`, creating the child when missing.
pub(crate) fn set_child_text(doc: &mut Document, parent: NodeId, child: &str, text: &str) {
    match doc.child(parent, child) {
        Some(existing) => doc.set_text(existing, text),
        None => {
            doc.append_text_element(parent, child, text);
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Generators for one compilation, in application order.
pub struct ElementRegistry {
    elements: Vec<Box<dyn JobElement>>,
}

impl ElementRegistry {
    /// Artifacts, mailer, version-file pattern, assigned node, SCM,
    /// periodic trigger, poll trigger.
    pub fn for_config(config: &BuildConfigurationModel) -> Self {
        Self {
            elements: vec![
                Box::new(Artifacts),
                Box::new(Mailer),
                Box::new(VersionFilePattern),
                Box::new(AssignedNode),
                Box::new(choose_scm(config)),
                Box::new(PeriodicTrigger),
                Box::new(PollScmTrigger),
            ],
        }
    }

    /// Apply every generator to `doc` in order.
    pub fn apply(&self, doc: &mut Document, config: &BuildConfigurationModel) -> Result<()> {
        for element in &self.elements {
            set_element(element.as_ref(), doc, config)?;
        }
        Ok(())
    }

    pub fn tags(&self) -> Vec<&str> {
        self.elements.iter().map(|e| e.element_tag()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildconf_shared::ProjectToBuild;

    fn template() -> Document {
        let content = std::fs::read_to_string("templates/JobTemplate.xml").expect("read template");
        Document::parse(&content).unwrap()
    }

    fn count(doc: &Document, tag: &str) -> usize {
        doc.find_all(&format!("//{tag}")).unwrap().len()
    }

    fn full_config() -> BuildConfigurationModel {
        BuildConfigurationModel {
            project_name: "demo".into(),
            scm: Some("git".into()),
            project_to_build: vec![ProjectToBuild {
                project_url: "https://host/org/demo.git".into(),
                local_directory_path: "demo".into(),
                artifacts: vec!["demo/out.zip".into()],
                ..Default::default()
            }],
            reg_exp: r"\d+\.\d+".into(),
            email: "dev@example.com".into(),
            build_machine_configuration: vec!["linux".into(), "docker".into()],
            poll_scm_trigger: "H/15 * * * *".into(),
            build_periodically_trigger: "H 2 * * *".into(),
            ..Default::default()
        }
    }

    #[test]
    fn registry_order_is_fixed() {
        let registry = ElementRegistry::for_config(&full_config());
        assert_eq!(
            registry.tags(),
            vec![
                "hudson.tasks.ArtifactArchiver",
                "hudson.tasks.Mailer",
                "org.jenkinsci.plugins.envinject.EnvInjectBuildWrapper",
                "assignedNode",
                "scm",
                "hudson.triggers.TimerTrigger",
                "hudson.triggers.SCMTrigger",
            ]
        );
    }

    #[test]
    fn apply_creates_each_tag_once() {
        let config = full_config();
        let mut doc = template();
        let registry = ElementRegistry::for_config(&config);
        registry.apply(&mut doc, &config).unwrap();

        for tag in registry.tags() {
            assert_eq!(count(&doc, tag), 1, "{tag}");
        }
        // Missing parent group was created under the root.
        assert_eq!(doc.find_all("/project/triggers").unwrap().len(), 1);
    }

    #[test]
    fn apply_twice_is_stable() {
        let config = full_config();
        let registry = ElementRegistry::for_config(&config);
        let mut doc = template();
        registry.apply(&mut doc, &config).unwrap();
        let first = doc.to_xml_string();

        registry.apply(&mut doc, &config).unwrap();
        assert_eq!(doc.to_xml_string(), first);
    }

    #[test]
    fn empty_config_only_sets_scm_and_marker() {
        let config = BuildConfigurationModel::default();
        let mut doc = template();
        ElementRegistry::for_config(&config).apply(&mut doc, &config).unwrap();

        assert_eq!(count(&doc, "hudson.tasks.ArtifactArchiver"), 0);
        assert_eq!(count(&doc, "hudson.tasks.Mailer"), 0);
        assert_eq!(count(&doc, "assignedNode"), 0);
        assert_eq!(count(&doc, "scm"), 1);
        let can_roam = doc.find_first("canRoam").unwrap();
        assert_eq!(doc.text(can_roam), "true");
    }

    #[test]
    fn render_xml_is_empty_when_nothing_to_emit() {
        let config = BuildConfigurationModel::default();
        assert_eq!(Mailer.render_xml(&config), "");
        assert!(Artifacts.render_xml(&full_config()).starts_with("<hudson.tasks.ArtifactArchiver>"));
    }
}
