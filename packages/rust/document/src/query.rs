//! A small path-expression language over [`Document`] trees.
//!
//! Grammar:
//!
//! ```text
//! path      := ["/" | "//"] step (("/" | "//") step)*
//! step      := name-test predicate*
//! name-test := "*" | element-name
//! predicate := "[" (positive-integer | "last()") "]"
//! ```
//!
//! Positional predicates apply per context node.

use std::collections::HashSet;

use buildconf_shared::{BuildConfError, Result};

use crate::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Named(String),
}

impl NameTest {
    fn matches(&self, name: Option<&str>) -> bool {
        match (self, name) {
            (Self::Any, Some(_)) => true,
            (Self::Named(expected), Some(actual)) => expected == actual,
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    absolute: bool,
    steps: Vec<Step>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ':')
}

impl PathExpr {
    /// Parse an expression, failing with [`BuildConfError::Query`].
    pub fn parse(expr: &str) -> Result<Self> {
        let err = |msg: &str| BuildConfError::query(expr, msg);

        let mut rest = expr.trim();
        if rest.is_empty() {
            return Err(err("empty expression"));
        }
        let absolute = rest.starts_with('/');
        let mut steps = Vec::new();

        loop {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else if steps.is_empty() {
                Axis::Child
            } else {
                return Err(err("expected `/` between steps"));
            };

            let end = rest
                .find(|c: char| !(is_name_char(c) || c == '*'))
                .unwrap_or(rest.len());
            let name = &rest[..end];
            let test = match name {
                "" => return Err(err("expected an element name")),
                "*" => NameTest::Any,
                n if n.contains('*') => return Err(err("wildcards must stand alone")),
                n => NameTest::Named(n.to_string()),
            };
            rest = &rest[end..];

            let mut predicates = Vec::new();
            while let Some(r) = rest.strip_prefix('[') {
                let close = r.find(']').ok_or_else(|| err("unterminated predicate"))?;
                let inner = r[..close].trim();
                let predicate = if inner == "last()" {
                    Predicate::Last
                } else {
                    match inner.parse::<usize>() {
                        Ok(0) => return Err(err("positions start at 1")),
                        Ok(n) => Predicate::Position(n),
                        Err(_) => return Err(err("unsupported predicate")),
                    }
                };
                predicates.push(predicate);
                rest = &r[close + 1..];
            }

            steps.push(Step {
                axis,
                test,
                predicates,
            });

            if rest.is_empty() {
                break;
            }
        }

        Ok(Self { absolute, steps })
    }

    /// Evaluate against `doc`. `context` of `None` means the document node.
    pub(crate) fn evaluate(&self, doc: &Document, context: Option<NodeId>) -> Vec<NodeId> {
        let start = if self.absolute { None } else { context };
        let mut contexts: Vec<Option<NodeId>> = vec![start];

        for step in &self.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();

            for ctx in &contexts {
                let candidates = match (step.axis, ctx) {
                    (Axis::Child, None) => vec![doc.root()],
                    (Axis::Child, Some(id)) => doc.children(*id),
                    (Axis::Descendant, None) => {
                        let mut all = vec![doc.root()];
                        all.extend(doc.descendants(doc.root()));
                        all
                    }
                    (Axis::Descendant, Some(id)) => doc.descendants(*id),
                };

                let mut matched: Vec<NodeId> = candidates
                    .into_iter()
                    .filter(|id| step.test.matches(doc.name(*id)))
                    .collect();
                for predicate in &step.predicates {
                    matched = match predicate {
                        Predicate::Position(n) => matched.get(n - 1).copied().into_iter().collect(),
                        Predicate::Last => matched.last().copied().into_iter().collect(),
                    };
                }

                for id in matched {
                    if seen.insert(id) {
                        next.push(id);
                    }
                }
            }

            if contexts.len() > 1 {
                let order = doc.document_order();
                next.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
            }
            contexts = next.into_iter().map(Some).collect();
        }

        contexts.into_iter().flatten().collect()
    }
}
