//! Boundary points and point walking over the DOM model.
//!
//! A [`Point`] is a DOM boundary point: inside a text node the offset counts
//! chars, inside an element it counts children. Walking visits every boundary
//! point of the editable subtree in document order and never leaves `root`.

use std::cmp::Ordering;

use crate::dom::{Document, NodeId, is_void_tag};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub node: NodeId,
    pub offset: usize,
}

impl Point {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Search direction used by range correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Self::Backward => Self::Forward,
            Self::Forward => Self::Backward,
        }
    }
}

pub fn is_left_edge(point: Point) -> bool {
    point.offset == 0
}

pub fn is_right_edge(doc: &Document, point: Point) -> bool {
    point.offset == doc.node_len(point.node)
}

/// Void in the editing sense: an element that renders without content.
pub fn is_void(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(|tag| {
        is_void_tag(tag) || matches!(tag, "iframe" | "button" | "video" | "object")
    })
}

/// Element without children, or holding a single `<br>`.
pub fn is_empty(doc: &Document, node: NodeId) -> bool {
    match doc.children(node) {
        [] => doc.node_len(node) == 0,
        [only] => doc.is_element(node) && doc.is_tag(*only, "br"),
        _ => false,
    }
}

/// The point just before `point`, or `None` at the start of `root`.
pub fn prev_point(doc: &Document, root: NodeId, point: Point) -> Option<Point> {
    if point.offset == 0 {
        if point.node == root {
            return None;
        }
        let parent = doc.parent(point.node)?;
        let offset = doc.index_in_parent(point.node)?;
        Some(Point::new(parent, offset))
    } else if doc.has_children(point.node) {
        let child = doc.child(point.node, point.offset - 1)?;
        Some(Point::new(child, doc.node_len(child)))
    } else {
        Some(Point::new(point.node, point.offset - 1))
    }
}

/// The point just after `point`, or `None` at the end of `root`.
pub fn next_point(doc: &Document, root: NodeId, point: Point) -> Option<Point> {
    if point.offset >= doc.node_len(point.node) {
        if point.node == root {
            return None;
        }
        let parent = doc.parent(point.node)?;
        let offset = doc.index_in_parent(point.node)? + 1;
        Some(Point::new(parent, offset))
    } else if doc.has_children(point.node) {
        let child = doc.child(point.node, point.offset)?;
        Some(Point::new(child, 0))
    } else {
        Some(Point::new(point.node, point.offset + 1))
    }
}

pub fn step(doc: &Document, root: NodeId, point: Point, direction: Direction) -> Option<Point> {
    match direction {
        Direction::Backward => prev_point(doc, root, point),
        Direction::Forward => next_point(doc, root, point),
    }
}

/// Walk backward from `point` (inclusive) until `pred` holds.
pub fn prev_point_until(
    doc: &Document,
    root: NodeId,
    point: Point,
    pred: impl Fn(Point) -> bool,
) -> Option<Point> {
    point_until(doc, root, point, Direction::Backward, pred)
}

/// Walk forward from `point` (inclusive) until `pred` holds.
pub fn next_point_until(
    doc: &Document,
    root: NodeId,
    point: Point,
    pred: impl Fn(Point) -> bool,
) -> Option<Point> {
    point_until(doc, root, point, Direction::Forward, pred)
}

pub fn point_until(
    doc: &Document,
    root: NodeId,
    point: Point,
    direction: Direction,
    pred: impl Fn(Point) -> bool,
) -> Option<Point> {
    let mut current = Some(point);
    while let Some(p) = current {
        if pred(p) {
            return Some(p);
        }
        current = step(doc, root, p, direction);
    }
    None
}

/// Whether a caret placed at `point` would render somewhere meaningful.
pub fn is_visible_point(doc: &Document, point: Point) -> bool {
    let node = point.node;
    if doc.is_text(node) || !doc.has_children(node) || is_empty(doc, node) {
        return true;
    }
    let left = point
        .offset
        .checked_sub(1)
        .and_then(|i| doc.child(node, i));
    let right = doc.child(node, point.offset);
    left.is_none_or(|n| is_void(doc, n)) && right.is_none_or(|n| is_void(doc, n))
}

/// First inclusive ancestor of `node` matching `pred`, not climbing past
/// `root`.
pub fn ancestor(
    doc: &Document,
    root: NodeId,
    node: NodeId,
    pred: impl Fn(NodeId) -> bool,
) -> Option<NodeId> {
    for current in doc.ancestors(node) {
        if pred(current) {
            return Some(current);
        }
        if current == root {
            break;
        }
    }
    None
}

/// Inclusive ancestors of `node` up to and including the first one matching
/// `pred`. `root` itself is never listed.
pub fn list_ancestor(
    doc: &Document,
    root: NodeId,
    node: NodeId,
    pred: impl Fn(NodeId) -> bool,
) -> Vec<NodeId> {
    let mut list = Vec::new();
    for current in doc.ancestors(node) {
        if current == root {
            break;
        }
        list.push(current);
        if pred(current) {
            break;
        }
    }
    list
}

/// Document order of two points of the same tree.
pub fn compare_points(doc: &Document, a: Point, b: Point) -> Ordering {
    path(doc, a).cmp(&path(doc, b))
}

fn path(doc: &Document, point: Point) -> Vec<usize> {
    let mut path: Vec<usize> = doc
        .ancestors(point.node)
        .filter_map(|n| doc.index_in_parent(n))
        .collect();
    path.reverse();
    path.push(point.offset);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(html: &str) -> (Document, NodeId) {
        let doc = Document::from_body_html(html);
        let root = doc.first_child(doc.body()).unwrap();
        (doc, root)
    }

    #[test]
    fn test_walk_forward_visits_all_points() {
        let (doc, root) = setup("<div>ab<b>c</b></div>");
        let ab = doc.child(root, 0).unwrap();
        let b = doc.child(root, 1).unwrap();
        let c = doc.first_child(b).unwrap();

        let mut points = vec![Point::new(root, 0)];
        while let Some(p) = next_point(&doc, root, *points.last().unwrap()) {
            points.push(p);
        }
        assert_eq!(
            points,
            vec![
                Point::new(root, 0),
                Point::new(ab, 0),
                Point::new(ab, 1),
                Point::new(ab, 2),
                Point::new(root, 1),
                Point::new(b, 0),
                Point::new(c, 0),
                Point::new(c, 1),
                Point::new(b, 1),
                Point::new(root, 2),
            ]
        );
    }

    #[test]
    fn test_walk_backward_mirrors_forward() {
        let (doc, root) = setup("<div>ab<b>c</b></div>");
        let mut forward = vec![Point::new(root, 0)];
        while let Some(p) = next_point(&doc, root, *forward.last().unwrap()) {
            forward.push(p);
        }
        let mut backward = vec![*forward.last().unwrap()];
        while let Some(p) = prev_point(&doc, root, *backward.last().unwrap()) {
            backward.push(p);
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_visible_points() {
        let (doc, root) = setup("<div>a<img><br><b>x</b></div>");
        // between "a" and img: text on the left is not void
        assert!(!is_visible_point(&doc, Point::new(root, 1)));
        // between img and br: both void
        assert!(is_visible_point(&doc, Point::new(root, 2)));
        // text points are always visible
        let a = doc.first_child(root).unwrap();
        assert!(is_visible_point(&doc, Point::new(a, 0)));

        let (doc, p) = setup("<p><br></p>");
        assert!(is_empty(&doc, p));
        assert!(is_visible_point(&doc, Point::new(p, 0)));
    }

    #[test]
    fn test_list_ancestor_stops_at_predicate_and_root() {
        let (doc, root) = setup(r#"<div><section id="u"><p id="a"><i>t</i></p></section></div>"#);
        let section = doc.find_by_id("u").unwrap();
        let p = doc.find_by_id("a").unwrap();
        let i = doc.first_child(p).unwrap();
        let t = doc.first_child(i).unwrap();

        let list = list_ancestor(&doc, root, t, |n| n == section);
        assert_eq!(list, vec![t, i, p, section]);

        let list = list_ancestor(&doc, root, t, |_| false);
        assert_eq!(list, vec![t, i, p, section]);
        assert!(!list.contains(&root));

        assert_eq!(ancestor(&doc, root, t, |n| n == p), Some(p));
        assert_eq!(ancestor(&doc, root, t, |n| n == doc.body()), None);
    }

    #[test]
    fn test_point_until() {
        let (doc, root) = setup("<div><b>x</b>yz</div>");
        let yz = doc.child(root, 1).unwrap();
        let found = next_point_until(&doc, root, Point::new(root, 0), |p| p.node == yz);
        assert_eq!(found, Some(Point::new(yz, 0)));
        let found = prev_point_until(&doc, root, Point::new(yz, 2), |p| doc.is_tag(p.node, "b"));
        assert_eq!(found.map(|p| p.node), Some(doc.child(root, 0).unwrap()));
        assert_eq!(next_point_until(&doc, root, Point::new(root, 0), |_| false), None);
    }

    #[test]
    fn test_compare_points() {
        let (doc, root) = setup("<div>ab<b>c</b></div>");
        let ab = doc.child(root, 0).unwrap();
        let c = doc.first_child(doc.child(root, 1).unwrap()).unwrap();
        assert_eq!(compare_points(&doc, Point::new(ab, 1), Point::new(c, 0)), Ordering::Less);
        assert_eq!(compare_points(&doc, Point::new(root, 1), Point::new(ab, 2)), Ordering::Greater);
        assert_eq!(compare_points(&doc, Point::new(root, 0), Point::new(ab, 0)), Ordering::Less);
        assert_eq!(compare_points(&doc, Point::new(c, 1), Point::new(c, 1)), Ordering::Equal);
    }
}
