//! Build-agent invocation steps.
//!
//! Jobs that have builders call the external build agent through two
//! conditional build steps, one for Windows nodes and one for every other
//! node. A step only counts as present when its expression, label and
//! command all match on the same conditional-builder element.

use buildconf_document::{Document, NodeId};
use buildconf_shared::{BuildConfError, Result};
use tracing::{debug, info};

/// Element name of a single conditional build step.
pub const SINGLE_CONDITIONAL_BUILDER: &str =
    "org.jenkinsci.plugins.conditionalbuildstep.singlestep.SingleConditionalBuilder";

const BUILD_STEPS_PATH: &str = "/project/builders/*";
const LAST_BUILDERS_PATH: &str = "/project/builders[last()]";
const OS_LABEL: &str = r#"${ENV,var="OS"}"#;

/// Signature of one agent-invocation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentScript {
    pub platform: &'static str,
    pub expression: &'static str,
    pub label: &'static str,
    pub command: &'static str,
}

pub const WINDOWS_SCRIPT: AgentScript = AgentScript {
    platform: "windows",
    expression: "(?i)Windows.*",
    label: OS_LABEL,
    command: r#"java -jar "%BUILDER_PATH%\build-configurator-server.jar" -nodeName "%NODE_NAME%" -jobName "%JOB_NAME%" -workspace "%WORKSPACE%" -jenkinsHome "%JENKINS_HOME%""#,
};

pub const OTHER_SCRIPT: AgentScript = AgentScript {
    platform: "other",
    expression: "(?i)(?!Windows).*",
    label: OS_LABEL,
    command: r#"java -jar "$BUILDER_PATH/build-configurator-server.jar" -nodeName "$NODE_NAME" -jobName "$JOB_NAME" -workspace "$WORKSPACE" -jenkinsHome $JENKINS_HOME"#,
};

pub const AGENT_SCRIPTS: [AgentScript; 2] = [WINDOWS_SCRIPT, OTHER_SCRIPT];

impl AgentScript {
    /// Whether `node` is a conditional builder carrying this signature.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if doc.name(node) != Some(SINGLE_CONDITIONAL_BUILDER) {
            return false;
        }
        let (mut expression, mut label, mut command) = (false, false, false);
        for child in doc.children(node) {
            match doc.name(child) {
                Some("condition") => {
                    for part in doc.children(child) {
                        match doc.name(part) {
                            Some("expression") if doc.text(part) == self.expression => {
                                expression = true
                            }
                            Some("label") if doc.text(part) == self.label => label = true,
                            _ => {}
                        }
                    }
                }
                Some("buildStep") => {
                    command |= doc
                        .children(child)
                        .into_iter()
                        .any(|c| doc.name(c) == Some("command") && doc.text(c) == self.command);
                }
                _ => {}
            }
        }
        expression && label && command
    }

    /// First build step in the document carrying this signature.
    pub fn find(&self, doc: &Document) -> Result<Option<NodeId>> {
        Ok(doc
            .find_all(BUILD_STEPS_PATH)?
            .into_iter()
            .find(|node| self.matches(doc, *node)))
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// True when both agent steps are present.
pub fn fragments_present(doc: &Document) -> Result<bool> {
    for script in &AGENT_SCRIPTS {
        if script.find(doc)?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Remove every matching agent step. Returns how many were removed.
pub fn remove_fragments(doc: &mut Document) -> Result<usize> {
    let mut removed = 0;
    for script in &AGENT_SCRIPTS {
        while let Some(node) = script.find(doc)? {
            doc.remove(node);
            removed += 1;
        }
    }
    Ok(removed)
}

/// Copy both agent steps from `template` into the last `builders` group of
/// `target`, replacing any partial set already there.
pub fn import_fragments(template: &Document, target: &mut Document) -> Result<()> {
    let mut sources = Vec::with_capacity(AGENT_SCRIPTS.len());
    for script in &AGENT_SCRIPTS {
        let node = script.find(template)?.ok_or_else(|| BuildConfError::MissingAnchor {
            path: format!("{BUILD_STEPS_PATH} ({} agent step)", script.platform),
        })?;
        sources.push(node);
    }

    remove_fragments(target)?;

    let builders = match target.find_all(LAST_BUILDERS_PATH)?.first() {
        Some(builders) => *builders,
        None => {
            let root = target.root();
            target.append_element(root, "builders")
        }
    };
    for source in sources {
        let node = target.import_subtree(template, source);
        target.append_child(builders, node);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// What [`reconcile`] did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentScriptAction {
    /// Agent not used; this many steps were removed.
    Removed(usize),
    /// Steps were copied in from the template.
    Imported,
    /// Document left as-is.
    Kept,
}

/// Bring the agent steps of `doc` in line with `use_agent`.
///
/// Only updates of live jobs are repaired from the template; fresh
/// documents come from the template and already carry the steps.
/// `load_template` is only called when an import is needed.
pub fn reconcile<F>(
    doc: &mut Document,
    use_agent: bool,
    is_update: bool,
    load_template: F,
) -> Result<AgentScriptAction>
where
    F: FnOnce() -> Result<Document>,
{
    if !use_agent {
        let removed = remove_fragments(doc)?;
        debug!(removed, "agent not used");
        return Ok(AgentScriptAction::Removed(removed));
    }
    if !is_update || fragments_present(doc)? {
        return Ok(AgentScriptAction::Kept);
    }

    let template = load_template()?;
    import_fragments(&template, doc)?;
    info!("restored agent steps from template");
    Ok(AgentScriptAction::Imported)
}
