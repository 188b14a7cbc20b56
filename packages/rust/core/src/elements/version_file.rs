//! Version-file pattern injected as a build environment property.

use buildconf_document::Document;
use buildconf_shared::{BuildConfigurationModel, Result};

use super::{JobElement, set_child_text};

const TAG: &str = "org.jenkinsci.plugins.envinject.EnvInjectBuildWrapper";
const PROPERTY: &str = "VERSION_FILE_PATTERN=";

/// Exposes the configuration's version-file regex to the build as
/// `VERSION_FILE_PATTERN`.
pub struct VersionFilePattern;

fn pattern(config: &BuildConfigurationModel) -> &str {
    config.reg_exp.trim()
}

/// Replace the `VERSION_FILE_PATTERN` line of a properties block, keeping
/// every other line.
fn rewrite_properties(content: &str, pattern: &str) -> String {
    let mut lines: Vec<String> = content
        .lines()
        .filter(|line| !line.trim_start().starts_with(PROPERTY))
        .map(str::to_string)
        .collect();
    if !pattern.is_empty() {
        lines.push(format!("{PROPERTY}{pattern}"));
    }
    lines.join("\n")
}

impl JobElement for VersionFilePattern {
    fn element_tag(&self) -> &str {
        TAG
    }

    fn parent_element_tag(&self) -> &str {
        "buildWrappers"
    }

    fn render(&self, config: &BuildConfigurationModel) -> Option<Document> {
        let pattern = pattern(config);
        if pattern.is_empty() {
            return None;
        }
        let mut doc = Document::new(TAG);
        let root = doc.root();
        let info = doc.append_element(root, "info");
        doc.append_text_element(info, "propertiesContent", &format!("{PROPERTY}{pattern}"));
        doc.append_text_element(info, "loadFilesFromMaster", "false");
        Some(doc)
    }

    fn merge_into(&self, config: &BuildConfigurationModel, doc: &mut Document) -> Result<()> {
        let Some(element) = doc.find_first(TAG) else {
            return Ok(());
        };
        let info = match doc.child(element, "info") {
            Some(info) => info,
            None => doc.append_element(element, "info"),
        };
        let current = doc.child_text(info, "propertiesContent").unwrap_or_default();
        let updated = rewrite_properties(&current, pattern(config));

        if updated.trim().is_empty() {
            doc.remove(element);
        } else {
            set_child_text(doc, info, "propertiesContent", &updated);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "version-file pattern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_pattern(reg_exp: &str) -> BuildConfigurationModel {
        BuildConfigurationModel {
            reg_exp: reg_exp.into(),
            ..Default::default()
        }
    }

    fn live(properties: &str) -> Document {
        Document::parse(&format!(
            "<project><buildWrappers><{TAG}><info><propertiesContent>{properties}</propertiesContent></info></{TAG}></buildWrappers></project>"
        ))
        .unwrap()
    }

    fn properties(doc: &Document) -> String {
        let info = doc.find_first("info").unwrap();
        doc.child_text(info, "propertiesContent").unwrap_or_default()
    }

    #[test]
    fn renders_property_line() {
        let fragment = VersionFilePattern.render(&with_pattern(r"v\d+")).unwrap();
        assert!(fragment.to_xml_string().contains(r"VERSION_FILE_PATTERN=v\d+"));
        assert!(VersionFilePattern.render(&with_pattern(" ")).is_none());
    }

    #[test]
    fn merge_rewrites_only_the_pattern_line() {
        let mut doc = live("A=1\nVERSION_FILE_PATTERN=old\nB=2");
        VersionFilePattern.merge_into(&with_pattern("new"), &mut doc).unwrap();
        assert_eq!(properties(&doc), "A=1\nB=2\nVERSION_FILE_PATTERN=new");
    }

    #[test]
    fn blank_pattern_drops_line_but_keeps_hand_written_ones() {
        let mut doc = live("A=1\nVERSION_FILE_PATTERN=old");
        VersionFilePattern.merge_into(&with_pattern(""), &mut doc).unwrap();
        assert_eq!(properties(&doc), "A=1");
    }

    #[test]
    fn blank_pattern_removes_wrapper_it_owned() {
        let mut doc = live("VERSION_FILE_PATTERN=old");
        VersionFilePattern.merge_into(&with_pattern(""), &mut doc).unwrap();
        assert!(doc.find_first(TAG).is_none());
    }
}
