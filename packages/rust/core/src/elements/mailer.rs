//! Mail notification publisher.

use buildconf_document::Document;
use buildconf_shared::{BuildConfigurationModel, Result};

use super::{JobElement, set_child_text};

const TAG: &str = "hudson.tasks.Mailer";

pub struct Mailer;

fn recipients(config: &BuildConfigurationModel) -> String {
    config.email.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl JobElement for Mailer {
    fn element_tag(&self) -> &str {
        TAG
    }

    fn parent_element_tag(&self) -> &str {
        "publishers"
    }

    fn render(&self, config: &BuildConfigurationModel) -> Option<Document> {
        let recipients = recipients(config);
        if recipients.is_empty() {
            return None;
        }
        let mut doc = Document::new(TAG);
        let root = doc.root();
        doc.append_text_element(root, "recipients", &recipients);
        doc.append_text_element(root, "dontNotifyEveryUnstableBuild", "false");
        doc.append_text_element(root, "sendToIndividuals", "false");
        Some(doc)
    }

    fn merge_into(&self, config: &BuildConfigurationModel, doc: &mut Document) -> Result<()> {
        let Some(element) = doc.find_first(TAG) else {
            return Ok(());
        };
        let recipients = recipients(config);
        if recipients.is_empty() {
            doc.remove(element);
        } else {
            set_child_text(doc, element, "recipients", &recipients);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mailer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_email(email: &str) -> BuildConfigurationModel {
        BuildConfigurationModel {
            email: email.into(),
            ..Default::default()
        }
    }

    #[test]
    fn recipients_are_space_separated() {
        let fragment = Mailer.render(&with_email(" a@x.org\n b@x.org ")).unwrap();
        assert_eq!(
            fragment.child_text(fragment.root(), "recipients").as_deref(),
            Some("a@x.org b@x.org")
        );
    }

    #[test]
    fn merge_keeps_hand_set_options() {
        let mut doc = Document::parse(
            "<project><publishers><hudson.tasks.Mailer><recipients>old@x.org</recipients><sendToIndividuals>true</sendToIndividuals></hudson.tasks.Mailer></publishers></project>",
        )
        .unwrap();
        Mailer.merge_into(&with_email("new@x.org"), &mut doc).unwrap();
        let mailer = doc.find_first(TAG).unwrap();
        assert_eq!(doc.child_text(mailer, "recipients").as_deref(), Some("new@x.org"));
        assert_eq!(doc.child_text(mailer, "sendToIndividuals").as_deref(), Some("true"));
    }

    #[test]
    fn blank_email_removes_mailer() {
        let mut doc =
            Document::parse("<project><publishers><hudson.tasks.Mailer/></publishers></project>")
                .unwrap();
        Mailer.merge_into(&with_email("  "), &mut doc).unwrap();
        assert!(doc.find_first(TAG).is_none());
    }
}
