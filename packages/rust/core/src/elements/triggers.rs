//! Cron-driven build triggers.

use buildconf_document::Document;
use buildconf_shared::{BuildConfigurationModel, Result};

use super::{JobElement, set_child_text};

const TIMER_TAG: &str = "hudson.triggers.TimerTrigger";
const POLL_TAG: &str = "hudson.triggers.SCMTrigger";

/// Builds on a fixed schedule.
pub struct PeriodicTrigger;

/// Polls source control on a schedule.
pub struct PollScmTrigger;

fn render_trigger(tag: &str, spec: &str, extra: &[(&str, &str)]) -> Option<Document> {
    if spec.is_empty() {
        return None;
    }
    let mut doc = Document::new(tag);
    let root = doc.root();
    doc.append_text_element(root, "spec", spec);
    for (name, value) in extra {
        doc.append_text_element(root, name, value);
    }
    Some(doc)
}

fn merge_trigger(doc: &mut Document, tag: &str, spec: &str) {
    let Some(element) = doc.find_first(tag) else {
        return;
    };
    if spec.is_empty() {
        doc.remove(element);
    } else {
        set_child_text(doc, element, "spec", spec);
    }
}

impl JobElement for PeriodicTrigger {
    fn element_tag(&self) -> &str {
        TIMER_TAG
    }

    fn parent_element_tag(&self) -> &str {
        "triggers"
    }

    fn render(&self, config: &BuildConfigurationModel) -> Option<Document> {
        render_trigger(TIMER_TAG, config.build_periodically_trigger.trim(), &[])
    }

    fn merge_into(&self, config: &BuildConfigurationModel, doc: &mut Document) -> Result<()> {
        merge_trigger(doc, TIMER_TAG, config.build_periodically_trigger.trim());
        Ok(())
    }

    fn name(&self) -> &str {
        "periodic trigger"
    }
}

impl JobElement for PollScmTrigger {
    fn element_tag(&self) -> &str {
        POLL_TAG
    }

    fn parent_element_tag(&self) -> &str {
        "triggers"
    }

    fn render(&self, config: &BuildConfigurationModel) -> Option<Document> {
        render_trigger(
            POLL_TAG,
            config.poll_scm_trigger.trim(),
            &[("ignorePostCommitHooks", "false")],
        )
    }

    fn merge_into(&self, config: &BuildConfigurationModel, doc: &mut Document) -> Result<()> {
        merge_trigger(doc, POLL_TAG, config.poll_scm_trigger.trim());
        Ok(())
    }

    fn name(&self) -> &str {
        "poll-scm trigger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedules(periodic: &str, poll: &str) -> BuildConfigurationModel {
        BuildConfigurationModel {
            build_periodically_trigger: periodic.into(),
            poll_scm_trigger: poll.into(),
            ..Default::default()
        }
    }

    #[test]
    fn renders_spec() {
        let cfg = schedules("H 2 * * *", "H/5 * * * *");
        assert_eq!(
            PeriodicTrigger.render_xml(&cfg),
            "<hudson.triggers.TimerTrigger><spec>H 2 * * *</spec></hudson.triggers.TimerTrigger>"
        );
        assert_eq!(
            PollScmTrigger.render_xml(&cfg),
            "<hudson.triggers.SCMTrigger><spec>H/5 * * * *</spec><ignorePostCommitHooks>false</ignorePostCommitHooks></hudson.triggers.SCMTrigger>"
        );
    }

    #[test]
    fn blank_schedule_renders_nothing() {
        assert!(PeriodicTrigger.render(&schedules("  ", "")).is_none());
        assert!(PollScmTrigger.render(&schedules("", "")).is_none());
    }

    #[test]
    fn merge_updates_or_removes() {
        let mut doc = Document::parse(
            "<project><triggers><hudson.triggers.TimerTrigger><spec>old</spec></hudson.triggers.TimerTrigger><hudson.triggers.SCMTrigger><spec>old</spec></hudson.triggers.SCMTrigger></triggers></project>",
        )
        .unwrap();
        let cfg = schedules("@daily", "");
        PeriodicTrigger.merge_into(&cfg, &mut doc).unwrap();
        PollScmTrigger.merge_into(&cfg, &mut doc).unwrap();

        assert_eq!(
            doc.to_xml_string(),
            "<project><triggers><hudson.triggers.TimerTrigger><spec>@daily</spec></hudson.triggers.TimerTrigger></triggers></project>"
        );
    }
}
