//! Range correction around protected ("unbreakable") nodes.
//!
//! Every selection change, key and mouse event passes through
//! [`RangeGuard`] before anything else sees it. The guard rewrites the
//! selection so that neither endpoint rests inside a protected node, except
//! inside an allowed island nested in one:
//!
//! ```text
//! <protected id="a">
//!     content_1
//!     <allowed id="c">
//!         content_3
//!         <protected id="e">content_5 <allowed id="f">content_6</allowed></protected>
//!         content_8
//!     </allowed>
//!     <protected id="g">content_9</protected>
//! </protected>
//! ```
//!
//! A caret in `content_1` moves to `content_3`. A selection from `content_3`
//! into `content_9` is trimmed back to the end of `content_8`.

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::classify::ProtectedNodeClassifier;
use crate::dom::{Document, NodeId};
use crate::events::{Key, KeyEvent, KeyOutcome};
use crate::media::MediaKind;
use crate::point::{
    Direction, Point, ancestor, compare_points, is_visible_point, list_ancestor, next_point,
    point_until, prev_point,
};
use crate::range::SelectionRange;

/// Zero-width space typed through when the caret sits in a protected node.
pub const MARKER: char = '\u{200B}';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Correction {
    Unchanged,
    Corrected,
    /// No valid point exists; the selection was collapsed on the editable
    /// root boundary.
    Impossible,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Deferred {
    StripMarker(NodeId),
    FocusEnd,
}

#[derive(Debug)]
pub struct RangeGuard {
    root: NodeId,
    classifier: ProtectedNodeClassifier,
    focused: Option<NodeId>,
    saved: Option<SelectionRange>,
    deferred: Vec<Deferred>,
}

impl RangeGuard {
    pub fn new(root: NodeId, classifier: ProtectedNodeClassifier) -> Self {
        Self {
            root,
            classifier,
            focused: None,
            saved: None,
            deferred: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn classifier(&self) -> &ProtectedNodeClassifier {
        &self.classifier
    }

    pub fn is_protected(&self, doc: &Document, node: NodeId) -> bool {
        self.classifier.is_unbreakable(doc, node)
    }

    /// Last selection written back by a correction.
    pub fn saved_range(&self) -> Option<SelectionRange> {
        self.saved
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Correct `selection` in place. `hint` is the arrow-key direction; the
    /// start endpoint searches forward by default and the end endpoint
    /// backward.
    pub fn secure_range(
        &mut self,
        doc: &Document,
        selection: &mut SelectionRange,
        hint: Option<Direction>,
    ) -> Correction {
        let original = *selection;
        let collapsed = selection.is_collapsed();
        let mut range = selection.clamp(doc);

        if self.is_protected(doc, range.sc) {
            let start_dir = hint.unwrap_or(Direction::Forward);
            let allowed = |p: Point| !self.is_protected(doc, p.node) && is_visible_point(doc, p);
            let found = point_until(doc, self.root, range.start(), start_dir, allowed)
                .or_else(|| point_until(doc, self.root, range.start(), start_dir.reverse(), allowed));
            match found {
                Some(point) => range.set_start(point),
                None => {
                    let boundary = match start_dir {
                        Direction::Backward => Point::new(self.root, 0),
                        Direction::Forward => Point::new(self.root, doc.node_len(self.root)),
                    };
                    debug!(target: "quire::guard", root = %self.root, "no editable point, collapsing on root boundary");
                    *selection = SelectionRange::from_points(boundary, boundary);
                    self.saved = Some(*selection);
                    return Correction::Impossible;
                }
            }
            if collapsed {
                range.collapse_to_start();
            }
        }

        if !collapsed {
            if compare_points(doc, range.start(), range.end()) == Ordering::Greater {
                range.collapse_to_start();
            } else {
                let allowed_ancestor = self.allowed_ancestor(doc, range.sc);
                let sc = range.sc;
                let end_dir = match hint {
                    Some(Direction::Forward) => Direction::Forward,
                    _ => Direction::Backward,
                };
                let fits = |p: Point| {
                    p.node == sc
                        || doc.contains(allowed_ancestor, p.node)
                            && !self.is_protected(doc, p.node)
                            && is_visible_point(doc, p)
                };
                let found = point_until(doc, self.root, range.end(), end_dir, fits)
                    .or_else(|| point_until(doc, self.root, range.end(), end_dir.reverse(), fits));
                if let Some(point) = found {
                    range.set_end(point);
                }
                if compare_points(doc, range.start(), range.end()) == Ordering::Greater {
                    range.collapse_to_start();
                }
            }
        }

        if range == original {
            return Correction::Unchanged;
        }
        let range = range.normalize(doc);
        trace!(target: "quire::guard", ?original, corrected = ?range, "range secured");
        *selection = range;
        self.saved = Some(range);
        Correction::Corrected
    }

    /// The subtree an extended selection starting in `sc` may reach: the
    /// child of the closest protected ancestor on the path to `sc`, or the
    /// whole root when that ancestor sits directly under it.
    fn allowed_ancestor(&self, doc: &Document, sc: NodeId) -> NodeId {
        let ancestors = list_ancestor(doc, self.root, sc, |n| self.is_protected(doc, n));
        let editable = ancestors
            .last()
            .and_then(|&n| doc.parent(n))
            .unwrap_or(self.root);
        if editable == self.root || ancestors.len() < 2 {
            return self.root;
        }
        ancestors[ancestors.len() - 2]
    }

    /// Record focus on `node`'s element. Returns it only when focus moved.
    pub fn focus_node(&mut self, doc: &Document, node: NodeId) -> Option<NodeId> {
        let element = doc.element_of(node).unwrap_or(node);
        if self.focused == Some(element) {
            return None;
        }
        self.focused = Some(element);
        Some(element)
    }

    /// Selection changed programmatically or by the engine.
    pub fn on_range(&mut self, doc: &Document, selection: &mut SelectionRange) -> Option<NodeId> {
        self.secure_range(doc, selection, None);
        self.focus_node(doc, selection.sc)
    }

    pub fn on_mouseup(&mut self, doc: &Document, selection: &mut SelectionRange) -> Option<NodeId> {
        self.secure_range(doc, selection, None);
        self.focus_node(doc, selection.ec)
    }

    /// Arrow keys jump over protected nodes in their reading direction.
    pub fn on_keyup(
        &mut self,
        doc: &Document,
        selection: &mut SelectionRange,
        event: &KeyEvent,
    ) -> Option<NodeId> {
        let direction = event.key.direction()?;
        self.secure_range(doc, selection, Some(direction));
        match direction {
            Direction::Backward => self.focus_node(doc, selection.sc),
            Direction::Forward => self.focus_node(doc, selection.ec),
        }
    }

    pub fn on_keydown(
        &mut self,
        doc: &mut Document,
        selection: &mut SelectionRange,
        event: &KeyEvent,
    ) -> KeyOutcome {
        if event.is_printable() {
            return self.on_printable(doc, selection);
        }
        if !matches!(event.key, Key::Backspace | Key::Delete) {
            return KeyOutcome::Proceed;
        }

        if self.secure_range(doc, selection, None) == Correction::Impossible {
            return KeyOutcome::Prevented;
        }
        if let Some(media) = self.selected_media(doc, selection) {
            doc.detach(media);
            selection.collapse_to_start();
            debug!(target: "quire::guard", %media, "selected media removed");
            self.deferred.push(Deferred::FocusEnd);
            return KeyOutcome::MediaRemoved(media);
        }
        if !selection.is_collapsed() {
            self.deferred.push(Deferred::FocusEnd);
            return KeyOutcome::Proceed;
        }

        let caret = selection.start();
        let outcome = if event.key == Key::Backspace {
            let before = prev_point(doc, self.root, caret).and_then(|p| {
                point_until(doc, self.root, p, Direction::Backward, |p| is_visible_point(doc, p))
            });
            match before {
                Some(p) if self.is_protected(doc, p.node) => {
                    trace!(target: "quire::guard", node = %p.node, "backspace into protected node");
                    KeyOutcome::Prevented
                }
                _ => KeyOutcome::Proceed,
            }
        } else {
            let after = next_point(doc, self.root, caret).and_then(|p| {
                point_until(doc, self.root, p, Direction::Forward, |p| is_visible_point(doc, p))
            });
            match after {
                Some(p) if self.is_protected(doc, p.node) => {
                    match ancestor(doc, self.root, p.node, |n| MediaKind::of(doc, n).is_some()) {
                        Some(media) => {
                            doc.detach(media);
                            debug!(target: "quire::guard", %media, "media removed by delete");
                            KeyOutcome::MediaRemoved(media)
                        }
                        None => {
                            trace!(target: "quire::guard", node = %p.node, "delete into protected node");
                            KeyOutcome::Prevented
                        }
                    }
                }
                _ => KeyOutcome::Proceed,
            }
        };
        self.deferred.push(Deferred::FocusEnd);
        outcome
    }

    fn on_printable(&mut self, doc: &mut Document, selection: &mut SelectionRange) -> KeyOutcome {
        if selection.is_collapsed() && self.is_protected(doc, selection.sc) {
            let writable = |p: Point| {
                doc.is_text(p.node) && is_visible_point(doc, p) && !self.is_protected(doc, p.node)
            };
            let caret = selection.start();
            let target = next_point(doc, self.root, caret)
                .and_then(|p| point_until(doc, self.root, p, Direction::Forward, writable))
                .or_else(|| {
                    prev_point(doc, self.root, caret)
                        .and_then(|p| point_until(doc, self.root, p, Direction::Backward, writable))
                });
            let Some(target) = target else {
                debug!(target: "quire::guard", "no writable point, keystroke suppressed");
                return KeyOutcome::Prevented;
            };
            let text = doc.text(target.node).unwrap_or_default();
            let marked: String = text
                .chars()
                .take(target.offset)
                .chain(std::iter::once(MARKER))
                .chain(text.chars().skip(target.offset))
                .collect();
            doc.set_text(target.node, marked);
            *selection = SelectionRange::collapsed(target.node, target.offset + 1);
            self.saved = Some(*selection);
            self.deferred.push(Deferred::StripMarker(target.node));
            trace!(target: "quire::guard", node = %target.node, "marker inserted");
            return KeyOutcome::Proceed;
        }

        if self.secure_range(doc, selection, None) == Correction::Impossible {
            return KeyOutcome::Prevented;
        }
        self.deferred.push(Deferred::FocusEnd);
        KeyOutcome::Proceed
    }

    /// A media element the selection exactly encloses.
    fn selected_media(&self, doc: &Document, selection: &SelectionRange) -> Option<NodeId> {
        if selection.sc != selection.ec || selection.eo != selection.so + 1 {
            return None;
        }
        let node = doc.child(selection.sc, selection.so)?;
        MediaKind::of(doc, node).map(|_| node)
    }

    /// Run work scheduled by key handlers once the engine has applied the
    /// key. Returns the new focus node, if focus moved.
    pub fn run_deferred(&mut self, doc: &mut Document, selection: &mut SelectionRange) -> Option<NodeId> {
        let mut focus = None;
        for task in std::mem::take(&mut self.deferred) {
            match task {
                Deferred::StripMarker(node) => {
                    let Some(text) = doc.text(node) else { continue };
                    // The engine may have typed on either side of the marker.
                    let Some(at) = text.chars().position(|c| c == MARKER) else {
                        continue;
                    };
                    let stripped: String = text
                        .chars()
                        .enumerate()
                        .filter_map(|(i, c)| (i != at).then_some(c))
                        .collect();
                    doc.set_text(node, stripped);
                    if selection.sc == node && selection.so > at {
                        selection.so -= 1;
                    }
                    if selection.ec == node && selection.eo > at {
                        selection.eo -= 1;
                    }
                    *selection = selection.normalize(doc);
                    focus = self.focus_node(doc, selection.ec).or(focus);
                }
                Deferred::FocusEnd => {
                    if doc.contains_id(selection.ec) {
                        focus = self.focus_node(doc, selection.ec).or(focus);
                    }
                }
            }
        }
        focus
    }
}
