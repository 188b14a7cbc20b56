//! Text-to-tree parsing on top of `quick-xml`'s pull reader.

use buildconf_shared::{BuildConfError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::trace;

use crate::{Document, NodeId, NodeKind};

pub(crate) fn parse(text: &str) -> Result<Document> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut doc = Document {
        nodes: Vec::new(),
        root: NodeId(0),
        declaration: None,
    };
    let mut root: Option<NodeId> = None;
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(BuildConfError::parse(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        };

        match event {
            Event::Start(start) => {
                let id = element_from(&mut doc, &start)?;
                attach(&mut doc, &mut root, &stack, id)?;
                stack.push(id);
            }
            Event::Empty(start) => {
                let id = element_from(&mut doc, &start)?;
                attach(&mut doc, &mut root, &stack, id)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .map_err(|e| BuildConfError::parse(e.to_string()))?;
                match stack.last() {
                    Some(&parent) => {
                        let id = doc.create_text(&value);
                        doc.append_child(parent, id);
                    }
                    None if value.trim().is_empty() => {}
                    None => return Err(BuildConfError::parse("text outside the root element")),
                }
            }
            Event::CData(c) => {
                let Some(&parent) = stack.last() else {
                    return Err(BuildConfError::parse("CDATA outside the root element"));
                };
                let value = utf8(&c)?;
                let id = doc.create_cdata(value);
                doc.append_child(parent, id);
            }
            Event::Comment(c) => {
                // Comments around the root element are dropped.
                if let Some(&parent) = stack.last() {
                    let value = utf8(&c)?;
                    let id = doc.create_comment(value);
                    doc.append_child(parent, id);
                }
            }
            Event::Decl(decl) => {
                doc.declaration = Some(String::from_utf8_lossy(&decl).into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        let name = doc.name(*open).unwrap_or_default().to_string();
        return Err(BuildConfError::parse(format!("unclosed element <{name}>")));
    }

    doc.root = root.ok_or_else(|| BuildConfError::parse("document has no root element"))?;
    trace!(nodes = doc.nodes.len(), "parsed document");
    Ok(doc)
}

fn element_from(doc: &mut Document, start: &BytesStart<'_>) -> Result<NodeId> {
    let name = utf8(start.name().as_ref())?.to_string();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| BuildConfError::parse(e.to_string()))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| BuildConfError::parse(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(doc.push(NodeKind::Element { name, attrs }))
}

fn attach(
    doc: &mut Document,
    root: &mut Option<NodeId>,
    stack: &[NodeId],
    id: NodeId,
) -> Result<()> {
    match stack.last() {
        Some(&parent) => doc.append_child(parent, id),
        None if root.is_none() => *root = Some(id),
        None => return Err(BuildConfError::parse("document has more than one root element")),
    }
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| BuildConfError::parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_template_fixture() {
        let content = std::fs::read_to_string("../../../fixtures/xml/minimal_job.xml")
            .expect("read fixture");
        let doc = parse(&content).unwrap();

        assert_eq!(doc.name(doc.root()), Some("project"));
        assert_eq!(
            doc.declaration(),
            Some("xml version='1.1' encoding='UTF-8'")
        );
        let includes = doc.find_first("includes").unwrap();
        assert_eq!(doc.text(includes), "JobConfig.xml");
    }

    #[test]
    fn serialization_is_stable_after_first_pass() {
        let content = std::fs::read_to_string("../../../fixtures/xml/minimal_job.xml")
            .expect("read fixture");
        let first = parse(&content).unwrap().to_xml_string();
        let second = parse(&first).unwrap().to_xml_string();
        assert_eq!(first, second);
    }

    #[test]
    fn whitespace_and_comments_are_kept() {
        let input = "<a>\n  <!-- note -->\n  <b>x</b>\n</a>";
        let doc = parse(input).unwrap();
        assert_eq!(doc.to_xml_string(), input);
    }

    #[test]
    fn entities_are_decoded_and_reencoded() {
        let doc = parse(r#"<label>${ENV,var=&quot;OS&quot;}</label>"#).unwrap();
        assert_eq!(doc.text(doc.root()), r#"${ENV,var="OS"}"#);
        assert_eq!(
            doc.to_xml_string(),
            "<label>${ENV,var=&quot;OS&quot;}</label>"
        );
    }

    #[test]
    fn empty_input_fails() {
        assert!(parse("").is_err());
        assert!(parse("   \n").is_err());
    }

    #[test]
    fn multiple_roots_fail() {
        let err = parse("<a/><b/>").unwrap_err();
        assert!(err.to_string().contains("more than one root"));
    }

    #[test]
    fn mismatched_tags_fail() {
        assert!(parse("<a><b></a>").is_err());
    }

    #[test]
    fn unclosed_element_fails() {
        assert!(parse("<a><b/>").is_err());
    }

    #[test]
    fn stray_text_fails() {
        assert!(parse("<a/>trailing").is_err());
    }
}
