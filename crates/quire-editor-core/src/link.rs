//! Links: what the link dialog is opened with, and writing its answer back.
//!
//! [`prepare`] reads the selection once, before the dialog opens, and decides
//! where the link will land: an anchor already under the caret, the nodes
//! the selection covers, or a bare insertion point. [`apply`] writes the
//! saved [`LinkChoice`] there.

use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::media::MediaKind;
use crate::point::Point;
use crate::range::SelectionRange;

/// What the dialog is opened with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkInfo {
    pub url: String,
    /// Visible text of the link, whitespace collapsed.
    pub text: String,
    /// Classes of the edited anchor, button styling removed.
    pub class_name: String,
    pub is_anchor: bool,
    /// Nothing is selected that could serve as a label.
    pub needs_label: bool,
    pub is_new_window: bool,
}

/// Button styling picked in the dialog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkStyle {
    /// `primary`, `secondary`, ...
    pub color: Option<String>,
    pub outline: bool,
    pub shape: Option<String>,
    /// `sm`, `lg`
    pub size: Option<String>,
}

/// What the dialog saved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkChoice {
    pub url: String,
    pub label: String,
    pub class_name: String,
    pub style: LinkStyle,
    pub is_new_window: bool,
}

impl LinkChoice {
    /// Bare e-mail addresses become `mailto:` links.
    pub fn href(&self) -> String {
        let url = self.url.trim();
        let lower = url.to_ascii_lowercase();
        if url.contains('@') && !lower.contains("mailto:") && !lower.starts_with("http") {
            format!("mailto:{url}")
        } else {
            url.to_string()
        }
    }

    /// Kept classes followed by the button classes of the chosen style.
    pub fn classes(&self) -> String {
        let mut classes: Vec<String> = self
            .class_name
            .split_ascii_whitespace()
            .map(str::to_string)
            .collect();
        if let Some(color) = &self.style.color {
            let outline = if self.style.outline { "outline-" } else { "" };
            classes.push("btn".to_string());
            classes.push(format!("btn-{outline}{color}"));
        }
        if let Some(shape) = &self.style.shape {
            classes.extend(shape.split_ascii_whitespace().map(str::to_string));
        }
        if let Some(size) = &self.style.size {
            classes.push(format!("btn-{size}"));
        }
        classes.join(" ")
    }
}

/// Where a saved link is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    /// Edit this anchor in place.
    Anchor(NodeId),
    /// Wrap these siblings in a new anchor.
    Wrap(Vec<NodeId>),
    /// Insert a new anchor at this point.
    Insert(Point),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEdit {
    pub info: LinkInfo,
    pub target: LinkTarget,
}

/// Closest `<a>` holding `node`, below `root`.
pub fn anchor_of(doc: &Document, root: NodeId, node: NodeId) -> Option<NodeId> {
    doc.ancestors(node)
        .take_while(|n| *n != root)
        .find(|n| doc.is_tag(*n, "a"))
}

/// Read the link under `range`. A non-collapsed selection outside an anchor
/// has its boundary text nodes split so it can be wrapped later.
pub fn prepare(doc: &mut Document, root: NodeId, range: SelectionRange) -> LinkEdit {
    if let Some(anchor) = anchor_of(doc, root, range.sc) {
        let text = collapse_spaces(&doc.text_content(anchor));
        let info = LinkInfo {
            url: shown_url(doc.attr(anchor, "href").unwrap_or_default()),
            needs_label: text.is_empty() && !has_media(doc, &[anchor]),
            text,
            class_name: without_button_classes(doc.attr(anchor, "class").unwrap_or_default()),
            is_anchor: true,
            is_new_window: doc.attr(anchor, "target") == Some("_blank"),
        };
        return LinkEdit {
            info,
            target: LinkTarget::Anchor(anchor),
        };
    }

    let nodes = range.split_to_siblings(doc);
    if nodes.is_empty() {
        return LinkEdit {
            info: LinkInfo {
                needs_label: true,
                ..LinkInfo::default()
            },
            target: LinkTarget::Insert(range.start()),
        };
    }
    let text: String = nodes.iter().map(|n| doc.text_content(*n)).collect();
    let text = collapse_spaces(&text);
    LinkEdit {
        info: LinkInfo {
            needs_label: text.is_empty() && !has_media(doc, &nodes),
            text,
            ..LinkInfo::default()
        },
        target: LinkTarget::Wrap(nodes),
    }
}

/// Write `choice` to the prepared target. Returns the anchor, or `None`
/// when the choice has no URL or the target is gone.
pub fn apply(doc: &mut Document, edit: LinkEdit, choice: &LinkChoice) -> Option<NodeId> {
    let href = choice.href();
    if href.is_empty() {
        debug!(target: "quire::link", "link saved without url, ignored");
        return None;
    }
    let label = choice.label.trim();
    let (anchor, relabel) = match edit.target {
        LinkTarget::Anchor(anchor) => (anchor, true),
        LinkTarget::Wrap(nodes) => {
            let first = *nodes.first()?;
            let anchor = doc.create_element("a");
            if !doc.insert_before(first, anchor) {
                return None;
            }
            for node in nodes {
                doc.append_child(anchor, node);
            }
            (anchor, true)
        }
        LinkTarget::Insert(point) => {
            let anchor = doc.create_element("a");
            insert_at(doc, point, anchor)?;
            let text = doc.create_text(if label.is_empty() { choice.url.trim() } else { label });
            doc.append_child(anchor, text);
            (anchor, false)
        }
    };

    // Only plain text is relabelled; media inside the link is kept.
    let text_only = doc.children(anchor).iter().all(|c| doc.is_text(*c));
    if relabel && text_only && !label.is_empty() && label != edit.info.text {
        doc.remove_children(anchor);
        let text = doc.create_text(label);
        doc.append_child(anchor, text);
    }

    doc.set_attr(anchor, "href", href);
    let classes = choice.classes();
    if classes.is_empty() {
        doc.remove_attr(anchor, "class");
    } else {
        doc.set_attr(anchor, "class", classes);
    }
    if choice.is_new_window {
        doc.set_attr(anchor, "target", "_blank");
    } else {
        doc.remove_attr(anchor, "target");
    }
    debug!(target: "quire::link", %anchor, "link written");
    Some(anchor)
}

fn insert_at(doc: &mut Document, point: Point, node: NodeId) -> Option<()> {
    if doc.is_text(point.node) {
        if point.offset == 0 {
            return doc.insert_before(point.node, node).then_some(());
        }
        if point.offset < doc.node_len(point.node) {
            doc.split_text(point.node, point.offset);
        }
        return doc.insert_after(point.node, node).then_some(());
    }
    doc.insert_child(point.node, point.offset, node);
    Some(())
}

fn has_media(doc: &Document, nodes: &[NodeId]) -> bool {
    nodes
        .iter()
        .flat_map(|n| doc.descendants(*n))
        .any(|n| matches!(MediaKind::of(doc, n), Some(MediaKind::Image | MediaKind::Icon)))
}

fn shown_url(href: &str) -> String {
    match href.find("mailto:") {
        Some(at) => href[at + "mailto:".len()..].to_string(),
        None => href.to_string(),
    }
}

/// Drop `btn` and `btn-*` classes; the dialog rebuilds them from its style.
fn without_button_classes(class: &str) -> String {
    class
        .split_ascii_whitespace()
        .filter(|c| {
            let c = c.to_ascii_lowercase();
            c != "btn" && !c.starts_with("btn-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if matches!(c, ' ' | '\t' | '\r' | '\n') {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(url: &str, label: &str) -> LinkChoice {
        LinkChoice {
            url: url.to_string(),
            label: label.to_string(),
            ..LinkChoice::default()
        }
    }

    #[test]
    fn test_wrap_selected_text() {
        let mut doc = Document::from_body_html(r#"<div id="r"><p id="p">go to the
shop</p></div>"#);
        let root = doc.find_by_id("r").unwrap();
        let p = doc.find_by_id("p").unwrap();
        let text = doc.first_child(p).unwrap();
        let edit = prepare(&mut doc, root, SelectionRange::new(text, 6, text, 14));
        assert_eq!(edit.info.text, "the shop");
        assert!(!edit.info.is_anchor);

        let anchor = apply(&mut doc, edit, &choice("https://example.com", "the shop")).unwrap();
        insta::assert_snapshot!(doc.inner_html(p), @r#"go to <a href="https://example.com">the
shop</a>"#);
        assert_eq!(anchor_of(&doc, root, doc.first_child(anchor).unwrap()), Some(anchor));
    }

    #[test]
    fn test_edit_existing_anchor() {
        let mut doc = Document::from_body_html(
            r#"<div id="r"><p><a id="a" href="mailto:me@example.com" class="lead btn btn-primary" target="_blank">mail</a></p></div>"#,
        );
        let root = doc.find_by_id("r").unwrap();
        let a = doc.find_by_id("a").unwrap();
        let text = doc.first_child(a).unwrap();
        let edit = prepare(&mut doc, root, SelectionRange::collapsed(text, 2));
        assert_eq!(
            edit.info,
            LinkInfo {
                url: "me@example.com".into(),
                text: "mail".into(),
                class_name: "lead".into(),
                is_anchor: true,
                needs_label: false,
                is_new_window: true,
            }
        );

        let saved = LinkChoice {
            url: "you@example.com".into(),
            label: "write us".into(),
            class_name: edit.info.class_name.clone(),
            style: LinkStyle {
                color: Some("secondary".into()),
                outline: true,
                shape: None,
                size: Some("sm".into()),
            },
            is_new_window: false,
        };
        assert_eq!(apply(&mut doc, edit, &saved), Some(a));
        insta::assert_snapshot!(
            doc.outer_html(a),
            @r#"<a id="a" href="mailto:you@example.com" class="lead btn btn-outline-secondary btn-sm">write us</a>"#
        );
    }

    #[test]
    fn test_collapsed_caret_inserts_labelled_link() {
        let mut doc = Document::from_body_html(r#"<div id="r"><p id="p">ab</p></div>"#);
        let root = doc.find_by_id("r").unwrap();
        let p = doc.find_by_id("p").unwrap();
        let ab = doc.first_child(p).unwrap();
        let edit = prepare(&mut doc, root, SelectionRange::collapsed(ab, 1));
        assert!(edit.info.needs_label);
        apply(&mut doc, edit, &choice("/shop", "")).unwrap();
        assert_eq!(doc.inner_html(p), r#"a<a href="/shop">/shop</a>b"#);
    }

    #[test]
    fn test_selected_image_is_kept_inside_link() {
        let mut doc = Document::from_body_html(r#"<div id="r"><p id="p">x<img src="/a.png">y</p></div>"#);
        let root = doc.find_by_id("r").unwrap();
        let p = doc.find_by_id("p").unwrap();
        let edit = prepare(&mut doc, root, SelectionRange::new(p, 1, p, 2));
        assert!(!edit.info.needs_label);
        apply(&mut doc, edit, &choice("/a", "ignored")).unwrap();
        assert_eq!(doc.inner_html(p), r#"x<a href="/a"><img src="/a.png"></a>y"#);
    }

    #[test]
    fn test_empty_url_changes_nothing() {
        let mut doc = Document::from_body_html(r#"<div id="r"><p id="p">ab</p></div>"#);
        let root = doc.find_by_id("r").unwrap();
        let p = doc.find_by_id("p").unwrap();
        let ab = doc.first_child(p).unwrap();
        let edit = prepare(&mut doc, root, SelectionRange::new(ab, 0, ab, 2));
        assert_eq!(apply(&mut doc, edit, &choice("  ", "ab")), None);
        assert_eq!(doc.inner_html(p), "ab");
    }
}
