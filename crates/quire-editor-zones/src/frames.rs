//! Browsing contexts and context-aware selection helpers.
//!
//! A page with an editor hosted in an iframe has two documents and two
//! selections. Node ids are only meaningful within their own document, so
//! every cross-context helper takes a [`NodeRef`] naming the window first.

use std::collections::BTreeMap;
use std::fmt;

use quire_editor_core::{
    Document, EditorError, NodeId, Placement, Result, SelectionRange, error::ConfigurationError,
};
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u32);

impl WindowId {
    /// The top-level page.
    pub const TOP: WindowId = WindowId(0);
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// A node in a specific browsing context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub window: WindowId,
    pub node: NodeId,
}

impl NodeRef {
    pub fn new(window: WindowId, node: NodeId) -> Self {
        Self { window, node }
    }
}

#[derive(Debug)]
pub struct Window {
    pub document: Document,
    selection: Option<SelectionRange>,
    parent: Option<WindowId>,
}

impl Window {
    pub fn parent(&self) -> Option<WindowId> {
        self.parent
    }

    pub fn selection(&self) -> Option<SelectionRange> {
        self.selection
    }
}

/// Registry of the browsing contexts of one page.
#[derive(Debug)]
pub struct Frames {
    top: Window,
    children: BTreeMap<WindowId, Window>,
    next: u32,
}

impl Frames {
    /// A registry holding only the top window.
    pub fn new(top: Document) -> Self {
        Self {
            top: Window {
                document: top,
                selection: None,
                parent: None,
            },
            children: BTreeMap::new(),
            next: 1,
        }
    }

    /// Register a child browsing context.
    pub fn open(&mut self, parent: WindowId, document: Document) -> WindowId {
        let id = WindowId(self.next);
        self.next += 1;
        self.children.insert(
            id,
            Window {
                document,
                selection: None,
                parent: Some(parent),
            },
        );
        trace!(target: "quire::iframe", window = %id, %parent, "window opened");
        id
    }

    /// Unregister a browsing context. The top window cannot be closed.
    pub fn close(&mut self, id: WindowId) -> Option<Document> {
        let window = self.children.remove(&id)?;
        trace!(target: "quire::iframe", window = %id, "window closed");
        Some(window.document)
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        if id == WindowId::TOP {
            Some(&self.top)
        } else {
            self.children.get(&id)
        }
    }

    fn window_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        if id == WindowId::TOP {
            Some(&mut self.top)
        } else {
            self.children.get_mut(&id)
        }
    }

    pub fn document(&self, id: WindowId) -> Option<&Document> {
        self.window(id).map(|w| &w.document)
    }

    pub fn document_mut(&mut self, id: WindowId) -> Option<&mut Document> {
        self.window_mut(id).map(|w| &mut w.document)
    }

    pub fn top(&self) -> &Document {
        &self.top.document
    }

    pub fn top_mut(&mut self) -> &mut Document {
        &mut self.top.document
    }

    /// Number of windows, the top one included.
    pub fn window_count(&self) -> usize {
        self.children.len() + 1
    }

    fn connected(&self, node: NodeRef) -> Result<&Window> {
        let window = self
            .window(node.window)
            .ok_or(ConfigurationError::MissingTarget(node.node))?;
        if !window.document.contains_id(node.node) {
            return Err(ConfigurationError::MissingTarget(node.node).into());
        }
        Ok(window)
    }

    /// The selection of the window owning `context`.
    pub fn get_range(&self, context: NodeRef) -> Result<Option<SelectionRange>> {
        Ok(self.connected(context)?.selection)
    }

    /// Select from `start` to `end`; both must live in the same window.
    pub fn set_range(
        &mut self,
        start: NodeRef,
        so: usize,
        end: NodeRef,
        eo: usize,
    ) -> Result<SelectionRange> {
        if start.window != end.window {
            return Err(EditorError::CrossFrameRange);
        }
        self.connected(start)?;
        self.connected(end)?;
        let window = self
            .window_mut(start.window)
            .ok_or(ConfigurationError::MissingTarget(start.node))?;
        let range = SelectionRange::new(start.node, so, end.node, eo)
            .clamp(&window.document)
            .normalize(&window.document);
        window.selection = Some(range);
        trace!(target: "quire::iframe", window = %start.window, ?range, "range set");
        Ok(range)
    }

    /// Collapsed caret at `node`/`offset`.
    pub fn set_caret(&mut self, node: NodeRef, offset: usize) -> Result<SelectionRange> {
        self.set_range(node, offset, node, offset)
    }

    pub fn set_range_from_node(&mut self, node: NodeRef, placement: Placement) -> Result<SelectionRange> {
        let window = self.connected(node)?;
        let range = SelectionRange::from_node(&window.document, node.node, placement);
        self.set_range(
            NodeRef::new(node.window, range.sc),
            range.so,
            NodeRef::new(node.window, range.ec),
            range.eo,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_windows() -> (Frames, WindowId) {
        let mut frames = Frames::new(Document::from_body_html(r#"<p id="host">host</p>"#));
        let child = frames.open(WindowId::TOP, Document::from_body_html(r#"<p id="inner">inner</p>"#));
        (frames, child)
    }

    #[test]
    fn test_ranges_are_per_window() {
        let (mut frames, child) = two_windows();
        let host = frames.top().find_by_id("host").unwrap();
        let inner = frames.document(child).unwrap().find_by_id("inner").unwrap();

        frames
            .set_range_from_node(NodeRef::new(child, inner), Placement::End)
            .unwrap();
        assert!(frames.get_range(NodeRef::new(WindowId::TOP, host)).unwrap().is_none());
        let range = frames.get_range(NodeRef::new(child, inner)).unwrap().unwrap();
        assert!(range.is_collapsed());
        assert_eq!(range.eo, 5);
    }

    #[test]
    fn test_cross_window_range_is_rejected() {
        let (mut frames, child) = two_windows();
        let host = frames.top().find_by_id("host").unwrap();
        let inner = frames.document(child).unwrap().find_by_id("inner").unwrap();
        let err = frames
            .set_range(NodeRef::new(WindowId::TOP, host), 0, NodeRef::new(child, inner), 0)
            .unwrap_err();
        assert!(matches!(err, EditorError::CrossFrameRange));
    }

    #[test]
    fn test_unknown_window() {
        let (mut frames, child) = two_windows();
        let inner = frames.document(child).unwrap().find_by_id("inner").unwrap();
        assert!(frames.close(child).is_some());
        assert!(frames.set_caret(NodeRef::new(child, inner), 0).is_err());
        assert!(frames.close(WindowId::TOP).is_none());
        assert_eq!(frames.window_count(), 1);
    }

    #[test]
    fn test_set_range_normalizes_into_text() {
        let (mut frames, _) = two_windows();
        let host = frames.top().find_by_id("host").unwrap();
        let range = frames.set_caret(NodeRef::new(WindowId::TOP, host), 0).unwrap();
        assert!(frames.top().is_text(range.sc));
        assert_eq!(range.so, 0);
    }
}
