//! Node restriction, toggled through the `canRoam` marker.

use buildconf_document::Document;
use buildconf_shared::{BuildConfigurationModel, Result};

use super::{CheckBox, JobElement};

const TAG: &str = "assignedNode";
const MARKER: &str = "canRoam";
const LABEL_SEPARATOR: &str = "||";

/// Restricts the job to the configured build machines.
///
/// A job that is restricted cannot roam, so checking the box writes
/// `canRoam=false` and unchecking writes `canRoam=true`.
pub struct AssignedNode;

fn label_expression(config: &BuildConfigurationModel) -> String {
    config
        .build_machine_configuration
        .iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}

fn set_marker(doc: &mut Document, value: &str) {
    let marker = match doc.find_first(MARKER) {
        Some(marker) => marker,
        None => {
            let root = doc.root();
            doc.append_element(root, MARKER)
        }
    };
    doc.set_text(marker, value);
}

impl CheckBox for AssignedNode {
    fn check(&self, doc: &mut Document) {
        set_marker(doc, "false");
    }

    fn uncheck(&self, doc: &mut Document) {
        set_marker(doc, "true");
    }
}

impl JobElement for AssignedNode {
    fn element_tag(&self) -> &str {
        TAG
    }

    fn parent_element_tag(&self) -> &str {
        "project"
    }

    fn render(&self, config: &BuildConfigurationModel) -> Option<Document> {
        let labels = label_expression(config);
        if labels.is_empty() {
            return None;
        }
        let mut doc = Document::new(TAG);
        let root = doc.root();
        doc.set_text(root, &labels);
        Some(doc)
    }

    fn merge_into(&self, config: &BuildConfigurationModel, doc: &mut Document) -> Result<()> {
        let Some(element) = doc.find_first(TAG) else {
            return Ok(());
        };
        let labels = label_expression(config);
        if labels.is_empty() {
            doc.remove(element);
            self.uncheck(doc);
        } else {
            doc.set_text(element, &labels);
            self.check(doc);
        }
        Ok(())
    }

    fn as_checkbox(&self) -> Option<&dyn CheckBox> {
        Some(self)
    }

    fn name(&self) -> &str {
        "assigned node"
    }
}
