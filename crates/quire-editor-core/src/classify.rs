//! Protected ("unbreakable") node classification.
//!
//! A protected node's own text cannot be edited and no caret may rest
//! directly inside it. Descendants the classifier does not flag form
//! editable islands inside the protected subtree.

use std::fmt;
use std::sync::Arc;

use crate::dom::{Document, NodeId};
use crate::media::MediaKind;

pub trait NodeClassifier: Send + Sync {
    /// Whether `node` (always an element) is protected.
    fn is_protected(&self, doc: &Document, node: NodeId) -> bool;
}

impl<F> NodeClassifier for F
where
    F: Fn(&Document, NodeId) -> bool + Send + Sync,
{
    fn is_protected(&self, doc: &Document, node: NodeId) -> bool {
        self(doc, node)
    }
}

/// Logical OR of independent classifiers.
#[derive(Clone, Default)]
pub struct ProtectedNodeClassifier {
    rules: Vec<(&'static str, Arc<dyn NodeClassifier>)>,
}

impl fmt::Debug for ProtectedNodeClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(name, _)| name))
            .finish()
    }
}

impl ProtectedNodeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named rule. Rules are OR-ed together.
    pub fn with(mut self, name: &'static str, rule: impl NodeClassifier + 'static) -> Self {
        self.push(name, rule);
        self
    }

    pub fn push(&mut self, name: &'static str, rule: impl NodeClassifier + 'static) {
        let rule: Arc<dyn NodeClassifier> = Arc::new(rule);
        self.rules.push((name, rule));
    }

    /// Append every rule of `other`.
    pub fn extend(&mut self, other: &ProtectedNodeClassifier) {
        self.rules.extend(other.rules.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|(name, _)| *name)
    }

    /// Text nodes are judged by their parent element. A node without a
    /// parent element is protected.
    pub fn is_unbreakable(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = doc.element_of(node) else {
            return true;
        };
        self.rules
            .iter()
            .any(|(_, rule)| rule.is_protected(doc, element))
    }
}

/// Everything that is neither the editable root nor inside it.
#[derive(Clone, Copy, Debug)]
pub struct OutsideEditable {
    pub root: NodeId,
}

impl NodeClassifier for OutsideEditable {
    fn is_protected(&self, doc: &Document, node: NodeId) -> bool {
        !doc.contains(self.root, node)
    }
}

/// Media elements are user-removable units but never editable inside.
#[derive(Clone, Copy, Debug, Default)]
pub struct MediaNode;

impl NodeClassifier for MediaNode {
    fn is_protected(&self, doc: &Document, node: NodeId) -> bool {
        MediaKind::of(doc, node).is_some()
    }
}

/// Nearest `o_not_editable` ancestor protects, nearest `o_editable` ancestor
/// allows, neither protects.
#[derive(Clone, Copy, Debug, Default)]
pub struct EditableClassRule;

pub const EDITABLE_CLASS: &str = "o_editable";
pub const NOT_EDITABLE_CLASS: &str = "o_not_editable";

impl NodeClassifier for EditableClassRule {
    fn is_protected(&self, doc: &Document, node: NodeId) -> bool {
        for current in doc.ancestors(node) {
            if doc.has_class(current, NOT_EDITABLE_CLASS) {
                return true;
            }
            if doc.has_class(current, EDITABLE_CLASS) {
                return false;
            }
        }
        true
    }
}

/// Nodes flagged `data-oe-readonly`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadonlyAttr;

impl NodeClassifier for ReadonlyAttr {
    fn is_protected(&self, doc: &Document, node: NodeId) -> bool {
        doc.has_attr(node, "data-oe-readonly")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_nodes_use_parent() {
        let doc = Document::from_body_html(r#"<div id="r"><b id="u">x</b>y</div>"#);
        let root = doc.find_by_id("r").unwrap();
        let u = doc.find_by_id("u").unwrap();
        let classifier = ProtectedNodeClassifier::new()
            .with("outside", OutsideEditable { root })
            .with("ids", move |_: &Document, n: NodeId| n == u);
        let x = doc.first_child(u).unwrap();
        let y = doc.child(root, 1).unwrap();
        assert!(classifier.is_unbreakable(&doc, x));
        assert!(!classifier.is_unbreakable(&doc, y));
        assert!(classifier.is_unbreakable(&doc, doc.body()));
    }

    #[test]
    fn test_detached_text_is_protected() {
        let mut doc = Document::new();
        let orphan = doc.create_text("lost");
        let classifier = ProtectedNodeClassifier::new();
        assert!(classifier.is_unbreakable(&doc, orphan));
    }

    #[test]
    fn test_editable_class_rule_islands() {
        let doc = Document::from_body_html(
            r#"<div class="o_editable"><p id="a">a</p><div class="o_not_editable" id="b"><span class="o_editable" id="c">c</span></div></div><p id="d">d</p>"#,
        );
        let rule = EditableClassRule;
        let id = |s| doc.find_by_id(s).unwrap();
        assert!(!rule.is_protected(&doc, id("a")));
        assert!(rule.is_protected(&doc, id("b")));
        assert!(!rule.is_protected(&doc, id("c")));
        assert!(rule.is_protected(&doc, id("d")));
    }

    #[test]
    fn test_readonly_and_media() {
        let doc = Document::from_body_html(r#"<span data-oe-readonly="1">r</span><img src="a.png">"#);
        let span = doc.child(doc.body(), 0).unwrap();
        let img = doc.child(doc.body(), 1).unwrap();
        let classifier = ProtectedNodeClassifier::new()
            .with("readonly", ReadonlyAttr)
            .with("media", MediaNode);
        assert!(classifier.is_unbreakable(&doc, span));
        assert!(classifier.is_unbreakable(&doc, img));
        assert_eq!(classifier.rule_names().collect::<Vec<_>>(), vec!["readonly", "media"]);
    }
}
