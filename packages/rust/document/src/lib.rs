//! In-memory job document model.
//!
//! A [`Document`] is an ordered tree of elements, text, CDATA and comment
//! nodes stored in an arena and addressed by [`NodeId`]. It supports:
//! - parsing and serialization (whitespace is kept as-is)
//! - tag-indexed lookup ([`Document::find_first`])
//! - path queries ([`Document::find_all`], [`Document::select`])
//! - subtree import across documents ([`Document::import_subtree`])
//!
//! Nothing is normalized implicitly: the tree only changes through the
//! explicit mutation calls.

mod parser;
mod query;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use buildconf_shared::{BuildConfError, Result};
use quick_xml::escape::escape;

pub use query::PathExpr;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Handle to a node inside one [`Document`].
///
/// Ids are only meaningful for the document that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An owned document tree with exactly one root element.
///
/// Detached nodes stay in the arena until the document is dropped; they are
/// simply unreachable from the root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    declaration: Option<String>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Document {
    /// Create a document holding a single empty root element.
    pub fn new(root_name: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            declaration: None,
        };
        doc.root = doc.create_element(root_name);
        doc
    }

    /// Parse a document from text.
    ///
    /// Fails with [`BuildConfError::DocumentParse`] on malformed input,
    /// a missing root, or more than one root element.
    pub fn parse(text: &str) -> Result<Self> {
        parser::parse(text)
    }

    /// Read and parse a document from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BuildConfError::io(path, e))?;
        Self::parse(&text).map_err(|e| match e {
            BuildConfError::DocumentParse { message } => {
                BuildConfError::parse(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// The XML declaration body (e.g. `xml version='1.1' encoding='UTF-8'`).
    pub fn declaration(&self) -> Option<&str> {
        self.declaration.as_deref()
    }

    pub fn set_declaration(&mut self, declaration: impl Into<String>) {
        self.declaration = Some(declaration.into());
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Element {
            name: name.to_string(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn create_cdata(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::CData(text.to_string()))
    }

    fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

impl Document {
    /// Element name, or `None` for non-element nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// All child nodes, including text and comments.
    pub fn child_nodes(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Child elements in document order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    pub fn first_child_element(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .find(|c| self.is_element(*c))
    }

    /// First child element with the given name.
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .find(|c| self.name(*c) == Some(name))
    }

    /// Descendant elements of `id` (excluding `id`) in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut out);
        out
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.nodes[id.0].children {
            if self.is_element(*child) {
                out.push(*child);
                self.collect_descendants(*child, out);
            }
        }
    }

    /// Concatenated text of every text and CDATA node below `id`.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) | NodeKind::CData(t) => out.push_str(t),
            NodeKind::Comment(_) => {}
            NodeKind::Element { .. } => {
                for child in &self.nodes[id.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Text of the first child element named `name`, if present.
    pub fn child_text(&self, id: NodeId, name: &str) -> Option<String> {
        self.child(id, name).map(|c| self.text(c))
    }

    /// First element named `tag` in depth-first document order, root included.
    pub fn find_first(&self, tag: &str) -> Option<NodeId> {
        if self.name(self.root) == Some(tag) {
            return Some(self.root);
        }
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.name(*id) == Some(tag))
    }

    /// Evaluate a path expression against the document.
    ///
    /// Supported syntax: `/abs/path`, `//tag`, `*`, `[n]` (1-based) and
    /// `[last()]`. Results are in document order without duplicates.
    pub fn find_all(&self, expr: &str) -> Result<Vec<NodeId>> {
        let path = PathExpr::parse(expr)?;
        Ok(path.evaluate(self, None))
    }

    /// Evaluate a path expression with `context` as the starting element.
    /// Absolute expressions ignore the context.
    pub fn select(&self, context: NodeId, expr: &str) -> Result<Vec<NodeId>> {
        let path = PathExpr::parse(expr)?;
        Ok(path.evaluate(self, Some(context)))
    }

    /// Pre-order position of every node reachable from the root.
    fn document_order(&self) -> HashMap<NodeId, usize> {
        let mut order = HashMap::new();
        order.insert(self.root, 0);
        for (i, id) in self.descendants(self.root).into_iter().enumerate() {
            order.insert(id, i + 1);
        }
        order
    }
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

impl Document {
    /// Set or replace an attribute on an element. No-op on other nodes.
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            match attrs.iter_mut().find(|(k, _)| k == key) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((key.to_string(), value.to_string())),
            }
        }
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Create an element and append it under `parent`.
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.create_element(name);
        self.append_child(parent, id);
        id
    }

    /// Append `<name>text</name>` under `parent`.
    pub fn append_text_element(&mut self, parent: NodeId, name: &str, text: &str) -> NodeId {
        let id = self.append_element(parent, name);
        self.set_text(id, text);
        id
    }

    /// Replace all children of `id` with a single text node.
    /// An empty string leaves the element childless.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let old = std::mem::take(&mut self.nodes[id.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(id, t);
        }
    }

    /// Detach a node from the tree. Removing the root is a no-op.
    pub fn remove(&mut self, id: NodeId) {
        if id != self.root {
            self.detach(id);
        }
    }

    /// Put `new` where `old` is and detach `old`.
    /// No-op when `old` is detached or is the root.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.nodes[old.0].parent else {
            return;
        };
        self.detach(new);
        let siblings = &mut self.nodes[parent.0].children;
        if let Some(pos) = siblings.iter().position(|c| *c == old) {
            siblings[pos] = new;
            self.nodes[new.0].parent = Some(parent);
            self.nodes[old.0].parent = None;
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Deep-copy a subtree of `source` into this document.
    /// The returned node is detached.
    pub fn import_subtree(&mut self, source: &Document, id: NodeId) -> NodeId {
        let copy = self.push(source.nodes[id.0].kind.clone());
        for child in &source.nodes[id.0].children {
            let imported = self.import_subtree(source, *child);
            self.append_child(copy, imported);
        }
        copy
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

impl Document {
    /// Serialize the whole document, declaration included.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        if let Some(decl) = &self.declaration {
            out.push_str("<?");
            out.push_str(decl);
            out.push_str("?>\n");
        }
        self.write_node(self.root, &mut out);
        out
    }

    /// Serialize one subtree without a declaration.
    pub fn serialize_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape(value.as_str()));
                    out.push('"');
                }
                if node.children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for child in &node.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            NodeKind::Text(text) => out.push_str(&escape(text.as_str())),
            NodeKind::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}
