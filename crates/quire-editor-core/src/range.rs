//! Selection ranges over the DOM model.

use crate::dom::{Document, NodeId};
use crate::point::Point;

/// A DOM selection: start container/offset and end container/offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SelectionRange {
    pub sc: NodeId,
    pub so: usize,
    pub ec: NodeId,
    pub eo: usize,
}

/// Where `SelectionRange::from_node` puts the selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Placement {
    /// Caret at the beginning of the first leaf.
    Begin,
    /// Caret at the end of the last leaf.
    End,
    /// Whole content selected.
    #[default]
    Content,
}

impl SelectionRange {
    pub fn new(sc: NodeId, so: usize, ec: NodeId, eo: usize) -> Self {
        Self { sc, so, ec, eo }
    }

    pub fn collapsed(node: NodeId, offset: usize) -> Self {
        Self::new(node, offset, node, offset)
    }

    pub fn from_points(start: Point, end: Point) -> Self {
        Self::new(start.node, start.offset, end.node, end.offset)
    }

    pub fn is_collapsed(&self) -> bool {
        self.sc == self.ec && self.so == self.eo
    }

    pub fn start(&self) -> Point {
        Point::new(self.sc, self.so)
    }

    pub fn end(&self) -> Point {
        Point::new(self.ec, self.eo)
    }

    pub fn set_start(&mut self, point: Point) {
        self.sc = point.node;
        self.so = point.offset;
    }

    pub fn set_end(&mut self, point: Point) {
        self.ec = point.node;
        self.eo = point.offset;
    }

    pub fn collapse_to_start(&mut self) {
        self.ec = self.sc;
        self.eo = self.so;
    }

    /// Move both boundary points into adjacent text nodes where possible, so
    /// that equivalent selections compare equal.
    pub fn normalize(self, doc: &Document) -> Self {
        let start = normalize_point(doc, self.start(), true);
        let end = if self.is_collapsed() {
            start
        } else {
            normalize_point(doc, self.end(), false)
        };
        Self::from_points(start, end)
    }

    /// Selection for `node` per `placement` (first/last leaf descent).
    pub fn from_node(doc: &Document, node: NodeId, placement: Placement) -> Self {
        let mut first = node;
        while let Some(child) = doc.first_child(first) {
            first = child;
        }
        let mut last = node;
        while let Some(child) = doc.last_child(last) {
            last = child;
        }
        let last_len = doc.text(last).map(|t| t.chars().count()).unwrap_or(0);
        match placement {
            Placement::Begin => Self::collapsed(first, 0),
            Placement::End => Self::collapsed(last, last_len),
            Placement::Content => Self::new(first, 0, last, last_len),
        }
    }

    /// Clamp offsets to the current node lengths.
    pub fn clamp(self, doc: &Document) -> Self {
        Self::new(
            self.sc,
            self.so.min(doc.node_len(self.sc)),
            self.ec,
            self.eo.min(doc.node_len(self.ec)),
        )
    }
}

impl SelectionRange {
    /// Split the boundary text nodes so the selection starts and ends on node
    /// edges, and return the run of siblings it covers under the closest
    /// common ancestor. Empty for a collapsed selection.
    pub fn split_to_siblings(&self, doc: &mut Document) -> Vec<NodeId> {
        if self.is_collapsed() {
            return Vec::new();
        }
        let Some(mut last) = end_node(doc, self.ec, self.eo) else {
            return Vec::new();
        };
        let first = if doc.is_text(self.sc) {
            let len = doc.node_len(self.sc);
            if self.so == 0 {
                Some(self.sc)
            } else if self.so < len {
                let tail = doc.split_text(self.sc, self.so);
                if last == self.sc {
                    last = tail.unwrap_or(last);
                }
                tail
            } else {
                following(doc, self.sc)
            }
        } else {
            doc.child(self.sc, self.so).or_else(|| following(doc, self.sc))
        };
        let Some(first) = first else {
            return Vec::new();
        };

        let Some(common) = doc
            .parent(first)
            .and_then(|p| doc.ancestors(p).find(|a| doc.contains(*a, last)))
        else {
            return Vec::new();
        };
        let top = |node: NodeId| {
            doc.ancestors(node)
                .find(|n| doc.parent(*n) == Some(common))
                .and_then(|n| doc.index_in_parent(n))
        };
        match (top(first), top(last)) {
            (Some(from), Some(to)) if from <= to => doc.children(common)[from..=to].to_vec(),
            _ => Vec::new(),
        }
    }
}

/// Last node fully inside a selection ending at (`node`, `offset`).
fn end_node(doc: &mut Document, node: NodeId, offset: usize) -> Option<NodeId> {
    if offset == 0 {
        return preceding(doc, node);
    }
    if doc.is_text(node) {
        if offset < doc.node_len(node) {
            doc.split_text(node, offset);
        }
        return Some(node);
    }
    doc.child(node, offset - 1)
}

/// Closest previous sibling of `node` or of one of its ancestors.
fn preceding(doc: &Document, node: NodeId) -> Option<NodeId> {
    doc.ancestors(node).find_map(|n| doc.previous_sibling(n))
}

fn following(doc: &Document, node: NodeId) -> Option<NodeId> {
    doc.ancestors(node).find_map(|n| doc.next_sibling(n))
}

fn normalize_point(doc: &Document, point: Point, prefer_right: bool) -> Point {
    if doc.is_text(point.node) {
        return point;
    }
    let left = point.offset.checked_sub(1).and_then(|i| doc.child(point.node, i));
    let right = doc.child(point.node, point.offset);
    let left_text = left.filter(|n| doc.is_text(*n));
    let right_text = right.filter(|n| doc.is_text(*n));
    let pick_right = |n: NodeId| Point::new(n, 0);
    let pick_left = |n: NodeId| Point::new(n, doc.node_len(n));
    match (left_text, right_text) {
        (Some(l), Some(r)) => {
            if prefer_right {
                pick_right(r)
            } else {
                pick_left(l)
            }
        }
        (None, Some(r)) => pick_right(r),
        (Some(l), None) => pick_left(l),
        (None, None) => point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapsed() {
        let doc = Document::from_body_html("<p>abc</p>");
        let p = doc.first_child(doc.body()).unwrap();
        let range = SelectionRange::collapsed(p, 0);
        assert!(range.is_collapsed());
        assert_eq!(range.start(), range.end());
    }

    #[test]
    fn test_normalize_descends_into_text() {
        let doc = Document::from_body_html("<p>ab<img>cd</p>");
        let p = doc.first_child(doc.body()).unwrap();
        let ab = doc.child(p, 0).unwrap();
        let cd = doc.child(p, 2).unwrap();

        let range = SelectionRange::collapsed(p, 0).normalize(&doc);
        assert_eq!(range, SelectionRange::collapsed(ab, 0));

        let range = SelectionRange::new(p, 0, p, 3).normalize(&doc);
        assert_eq!(range, SelectionRange::new(ab, 0, cd, 2));

        // only the left neighbour is text
        let range = SelectionRange::collapsed(p, 1).normalize(&doc);
        assert_eq!(range, SelectionRange::collapsed(ab, 2));
    }

    #[test]
    fn test_split_to_siblings() {
        let mut doc = Document::from_body_html("<p>abc<b>de</b>fgh</p>");
        let p = doc.first_child(doc.body()).unwrap();
        let abc = doc.child(p, 0).unwrap();
        let fgh = doc.child(p, 2).unwrap();

        let nodes = SelectionRange::new(abc, 1, fgh, 2).split_to_siblings(&mut doc);
        assert_eq!(nodes.len(), 3);
        let covered: String = nodes.iter().map(|n| doc.text_content(*n)).collect();
        assert_eq!(covered, "bcdefg");
        assert_eq!(doc.text_content(p), "abcdefgh");

        // inside a single text node
        let mut doc = Document::from_body_html("<p>hello</p>");
        let p = doc.first_child(doc.body()).unwrap();
        let hello = doc.first_child(p).unwrap();
        let nodes = SelectionRange::new(hello, 1, hello, 4).split_to_siblings(&mut doc);
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.text(nodes[0]), Some("ell"));
        assert_eq!(doc.children(p).len(), 3);

        assert!(SelectionRange::collapsed(hello, 1).split_to_siblings(&mut doc).is_empty());
    }

    #[test]
    fn test_from_node() {
        let doc = Document::from_body_html("<div><p>first</p><p>last</p></div>");
        let div = doc.first_child(doc.body()).unwrap();
        let first = doc.first_child(doc.child(div, 0).unwrap()).unwrap();
        let last = doc.first_child(doc.child(div, 1).unwrap()).unwrap();

        assert_eq!(
            SelectionRange::from_node(&doc, div, Placement::Begin),
            SelectionRange::collapsed(first, 0)
        );
        assert_eq!(
            SelectionRange::from_node(&doc, div, Placement::End),
            SelectionRange::collapsed(last, 4)
        );
        assert_eq!(
            SelectionRange::from_node(&doc, div, Placement::Content),
            SelectionRange::new(first, 0, last, 4)
        );
    }
}
