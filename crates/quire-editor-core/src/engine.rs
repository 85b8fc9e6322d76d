//! Adapter over the rich-text editing engine.
//!
//! The session never touches engine internals: binding, serialization and
//! history all go through [`EditingEngine`]. [`SnapshotEngine`] is the
//! in-crate implementation, keeping history as content snapshots.

use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::error::{ConfigurationError, Result};
use crate::options::EditorOptions;
use crate::text::text_to_html;
use crate::undo::{History, Snapshot, UndoManager};

pub const EDITABLE_CLASS: &str = "note-editable";

pub trait EditingEngine: Send {
    /// Bind to `target` and return the editable root.
    fn bind(&mut self, doc: &mut Document, target: NodeId, options: &EditorOptions) -> Result<NodeId>;

    fn editable(&self) -> Option<NodeId>;

    /// Serialized content of the editable root.
    fn code(&self, doc: &Document) -> String;

    fn set_code(&mut self, doc: &mut Document, html: &str);

    /// Capture an undo checkpoint of the current content.
    fn record_undo(&mut self, doc: &Document);

    fn undo(&mut self, doc: &mut Document) -> bool;

    fn redo(&mut self, doc: &mut Document) -> bool;

    /// Back to the oldest checkpoint.
    fn rewind(&mut self, doc: &mut Document) -> bool;

    /// Release the target. Calling it when unbound is a no-op.
    fn unbind(&mut self, doc: &mut Document);
}

#[derive(Debug, Clone)]
struct Binding {
    target: NodeId,
    editable: NodeId,
    value_holder: bool,
    style: Option<String>,
    contenteditable: Option<String>,
    had_class: bool,
}

#[derive(Debug, Default)]
pub struct SnapshotEngine {
    binding: Option<Binding>,
    history: History,
}

impl SnapshotEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn target(&self) -> Option<NodeId> {
        self.binding.as_ref().map(|b| b.target)
    }

    fn restore(&mut self, doc: &mut Document, snapshot: Option<Snapshot>) -> bool {
        match (snapshot, self.editable()) {
            (Some(snapshot), Some(editable)) => {
                doc.replace_children(editable, &snapshot);
                true
            }
            _ => false,
        }
    }

    fn snapshot(&self, doc: &Document) -> Snapshot {
        self.editable()
            .map(|e| doc.export_children(e))
            .unwrap_or_default()
    }
}

impl EditingEngine for SnapshotEngine {
    fn bind(&mut self, doc: &mut Document, target: NodeId, options: &EditorOptions) -> Result<NodeId> {
        if !doc.contains_id(target) {
            return Err(ConfigurationError::MissingTarget(target).into());
        }
        if !doc.is_connected(target) {
            return Err(ConfigurationError::NotMounted(target).into());
        }
        self.unbind(doc);

        let value_holder = doc.is_tag(target, "textarea");
        let binding = if value_holder {
            let editable = doc.create_element("div");
            doc.add_class(editable, EDITABLE_CLASS);
            doc.set_attr(editable, "contenteditable", "true");
            let html = text_to_html(&doc.text_content(target));
            doc.set_inner_html(editable, &html);
            doc.insert_after(target, editable);
            let style = doc.attr(target, "style").map(str::to_string);
            doc.set_attr(target, "style", "display: none");
            Binding {
                target,
                editable,
                value_holder,
                style,
                contenteditable: None,
                had_class: false,
            }
        } else {
            let had_class = doc.has_class(target, EDITABLE_CLASS);
            let contenteditable = doc.attr(target, "contenteditable").map(str::to_string);
            doc.add_class(target, EDITABLE_CLASS);
            doc.set_attr(target, "contenteditable", "true");
            Binding {
                target,
                editable: target,
                value_holder,
                style: None,
                contenteditable,
                had_class,
            }
        };
        let editable = binding.editable;
        debug!(target: "quire::session", %target, %editable, value_holder, "engine bound");
        self.binding = Some(binding);
        self.history = History::new(options.history_depth);
        Ok(editable)
    }

    fn editable(&self) -> Option<NodeId> {
        self.binding.as_ref().map(|b| b.editable)
    }

    fn code(&self, doc: &Document) -> String {
        self.editable()
            .map(|e| doc.inner_html(e))
            .unwrap_or_default()
    }

    fn set_code(&mut self, doc: &mut Document, html: &str) {
        if let Some(editable) = self.editable() {
            doc.set_inner_html(editable, html);
        }
    }

    fn record_undo(&mut self, doc: &Document) {
        if self.binding.is_some() {
            let snapshot = self.snapshot(doc);
            self.history.record(snapshot);
        }
    }

    fn undo(&mut self, doc: &mut Document) -> bool {
        let current = self.snapshot(doc);
        let previous = self.history.undo(current);
        self.restore(doc, previous)
    }

    fn redo(&mut self, doc: &mut Document) -> bool {
        let current = self.snapshot(doc);
        let next = self.history.redo(current);
        self.restore(doc, next)
    }

    fn rewind(&mut self, doc: &mut Document) -> bool {
        let current = self.snapshot(doc);
        let oldest = self.history.rewind(current);
        self.restore(doc, oldest)
    }

    fn unbind(&mut self, doc: &mut Document) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        if binding.value_holder {
            doc.detach(binding.editable);
            match binding.style {
                Some(style) => doc.set_attr(binding.target, "style", style),
                None => {
                    doc.remove_attr(binding.target, "style");
                }
            }
        } else {
            match binding.contenteditable {
                Some(value) => doc.set_attr(binding.target, "contenteditable", value),
                None => {
                    doc.remove_attr(binding.target, "contenteditable");
                }
            }
            if !binding.had_class {
                doc.remove_class(binding.target, EDITABLE_CLASS);
            }
        }
        self.history.clear_history();
        debug!(target: "quire::session", target = %binding.target, "engine unbound");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EditorError;

    #[test]
    fn test_bind_raw_target_and_restore() {
        let mut doc = Document::from_body_html(r#"<div id="t" class="x">hello</div>"#);
        let target = doc.find_by_id("t").unwrap();
        let mut engine = SnapshotEngine::new();
        let editable = engine.bind(&mut doc, target, &EditorOptions::default()).unwrap();
        assert_eq!(editable, target);
        assert!(doc.has_class(target, EDITABLE_CLASS));
        assert_eq!(doc.attr(target, "contenteditable"), Some("true"));
        assert_eq!(engine.code(&doc), "hello");

        engine.unbind(&mut doc);
        assert_eq!(doc.outer_html(target), r#"<div id="t" class="x">hello</div>"#);
        engine.unbind(&mut doc);
    }

    #[test]
    fn test_bind_value_holder() {
        let mut doc = Document::from_body_html("<textarea id=\"t\">line 1\nline 2</textarea>");
        let target = doc.find_by_id("t").unwrap();
        let mut engine = SnapshotEngine::new();
        let editable = engine.bind(&mut doc, target, &EditorOptions::default()).unwrap();
        assert_ne!(editable, target);
        assert_eq!(doc.next_sibling(target), Some(editable));
        assert_eq!(engine.code(&doc), "<p>line 1</p><p>line 2</p>");
        assert_eq!(doc.style_value(target, "display"), Some("none"));

        engine.unbind(&mut doc);
        assert!(!doc.is_connected(editable));
        assert!(!doc.has_attr(target, "style"));
    }

    #[test]
    fn test_bind_requires_mounted_target() {
        let mut doc = Document::new();
        let detached = doc.create_element("div");
        let err = SnapshotEngine::new()
            .bind(&mut doc, detached, &EditorOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            EditorError::Configuration(ConfigurationError::NotMounted(_))
        ));
    }

    #[test]
    fn test_history_steps() {
        let mut doc = Document::from_body_html(r#"<div id="t">a</div>"#);
        let target = doc.find_by_id("t").unwrap();
        let mut engine = SnapshotEngine::new();
        engine.bind(&mut doc, target, &EditorOptions::default()).unwrap();

        engine.record_undo(&doc);
        engine.set_code(&mut doc, "ab");
        engine.record_undo(&doc);
        engine.set_code(&mut doc, "abc");

        assert!(engine.undo(&mut doc));
        assert_eq!(engine.code(&doc), "ab");
        assert!(engine.redo(&mut doc));
        assert_eq!(engine.code(&doc), "abc");
        assert!(engine.rewind(&mut doc));
        assert_eq!(engine.code(&doc), "a");
        assert!(!engine.undo(&mut doc));
    }
}
