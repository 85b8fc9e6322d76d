//! Text color, background color and font size over a selection.
//!
//! Every visible text node (and icon) the selection covers ends up inside a
//! `<font>` carrying the change as classes (`text-*`, `bg-*`) or inline
//! style. Fonts left without class or style are unwrapped, and neighbouring
//! fonts with identical styling are merged.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::media::MediaKind;
use crate::point::Point;
use crate::range::SelectionRange;

/// One font command. A color starting with `text-` (or `bg-`) is a theme
/// class, anything else an inline CSS color. `text-undefined` and
/// `bg-undefined` reset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontChange {
    pub color: Option<String>,
    pub background: Option<String>,
    /// Pixel size, or a non-numeric value such as `Default` to reset.
    pub size: Option<String>,
}

impl FontChange {
    pub fn fore_color(color: &str) -> Self {
        Self {
            color: Some(color.to_string()),
            ..Self::default()
        }
    }

    pub fn back_color(color: &str) -> Self {
        Self {
            background: Some(color.to_string()),
            ..Self::default()
        }
    }

    pub fn font_size(size: &str) -> Self {
        Self {
            size: Some(size.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.background.is_none() && self.size.is_none()
    }
}

fn is_font(doc: &Document, node: NodeId) -> bool {
    doc.is_tag(node, "font") || MediaKind::of(doc, node) == Some(MediaKind::Icon)
}

fn is_visible_text(doc: &Document, node: NodeId) -> bool {
    doc.text(node)
        .is_some_and(|t| t.chars().any(|c| c == '\u{a0}' || !c.is_whitespace()))
}

/// Apply `change` to the nodes `range` covers inside `root`. Returns the
/// selection over the restyled content, or `None` when nothing was touched.
pub fn apply(
    doc: &mut Document,
    root: NodeId,
    range: SelectionRange,
    change: &FontChange,
) -> Option<SelectionRange> {
    if change.is_empty() {
        return None;
    }
    let covered = range.split_to_siblings(doc);
    let mut targets: Vec<NodeId> = Vec::new();
    for node in covered.iter().flat_map(|n| doc.descendants(*n)) {
        let icon = MediaKind::of(doc, node) == Some(MediaKind::Icon);
        let in_icon = doc
            .parent(node)
            .is_some_and(|p| MediaKind::of(doc, p) == Some(MediaKind::Icon));
        if icon || (is_visible_text(doc, node) && !in_icon) {
            targets.push(node);
        }
    }
    let (first, last) = (*targets.first()?, *targets.last()?);

    let mut fonts: Vec<NodeId> = Vec::new();
    for node in targets {
        let existing = doc
            .ancestors(node)
            .take_while(|n| *n != root)
            .find(|n| is_font(doc, *n));
        let font = match existing {
            Some(font) => font,
            None => wrap_in_font(doc, node),
        };
        if !fonts.contains(&font) {
            restyle(doc, font, change);
            fonts.push(font);
        }
    }

    for font in fonts {
        if !doc.is_tag(font, "font") {
            continue;
        }
        if !doc.has_attr(font, "class") && !doc.has_attr(font, "style") {
            doc.unwrap_node(font);
            continue;
        }
        if let Some(previous) = doc.previous_sibling(font)
            && doc.is_tag(previous, "font")
            && doc.attr(previous, "class") == doc.attr(font, "class")
            && doc.attr(previous, "style") == doc.attr(font, "style")
        {
            for child in doc.children(font).to_vec() {
                doc.append_child(previous, child);
            }
            doc.detach(font);
        }
    }

    debug!(target: "quire::font", ?change, "font applied");
    Some(SelectionRange::from_points(
        Point::new(first, 0),
        Point::new(last, doc.node_len(last)),
    ))
}

fn wrap_in_font(doc: &mut Document, node: NodeId) -> NodeId {
    // Edge spaces would collapse once wrapped.
    if let Some(text) = doc.text(node)
        && (text.starts_with(' ') || text.ends_with(' '))
    {
        let mut chars: Vec<char> = text.chars().collect();
        let last = chars.len() - 1;
        for i in [0, last] {
            if chars[i] == ' ' {
                chars[i] = '\u{a0}';
            }
        }
        doc.set_text(node, chars.into_iter().collect::<String>());
    }
    let font = doc.create_element("font");
    doc.insert_before(node, font);
    doc.append_child(font, node);
    font
}

fn restyle(doc: &mut Document, font: NodeId, change: &FontChange) {
    let mut classes: Vec<String> = doc.classes(font).map(str::to_string).collect();
    if let Some(color) = &change.color {
        let css = theme_value(&mut classes, "text-", color);
        doc.set_style_value(font, "color", css.as_deref());
    }
    if let Some(background) = &change.background {
        let css = theme_value(&mut classes, "bg-", background);
        doc.set_style_value(font, "background-color", css.as_deref());
    }
    if let Some(size) = &change.size {
        let px = size.trim().parse::<f64>().ok().map(|s| format!("{s}px"));
        doc.set_style_value(font, "font-size", px.as_deref());
    }
    classes.sort();
    classes.dedup();
    if classes.is_empty() {
        doc.remove_attr(font, "class");
    } else {
        doc.set_attr(font, "class", classes.join(" "));
    }
}

/// Swap the `prefix` class in `classes` for `value` when it is a theme class.
/// Returns the inline CSS value to set otherwise.
fn theme_value(classes: &mut Vec<String>, prefix: &str, value: &str) -> Option<String> {
    classes.retain(|c| !c.starts_with(prefix));
    if value == format!("{prefix}undefined") {
        None
    } else if value.starts_with(prefix) {
        classes.push(value.to_string());
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(html: &str) -> (Document, NodeId, NodeId) {
        let doc = Document::from_body_html(&format!(r#"<div id="r"><p id="p">{html}</p></div>"#));
        let root = doc.find_by_id("r").unwrap();
        let p = doc.find_by_id("p").unwrap();
        (doc, root, p)
    }

    #[test]
    fn test_theme_color_wraps_selection() {
        let (mut doc, root, p) = paragraph("hello world");
        let text = doc.first_child(p).unwrap();
        let range = SelectionRange::new(text, 6, text, 11);
        let selected = apply(&mut doc, root, range, &FontChange::fore_color("text-primary")).unwrap();
        insta::assert_snapshot!(doc.inner_html(p), @r#"hello <font class="text-primary">world</font>"#);
        assert_eq!(doc.text(selected.sc), Some("world"));
        assert_eq!(selected.eo, 5);
    }

    #[test]
    fn test_restyle_existing_font_and_reset() {
        let (mut doc, root, p) = paragraph(r#"<font class="text-primary bg-alpha">ab</font>"#);
        let font = doc.first_child(p).unwrap();
        let text = doc.first_child(font).unwrap();
        let range = SelectionRange::new(text, 0, text, 2);

        let change = FontChange {
            color: Some("#ff0000".into()),
            size: Some("18".into()),
            ..FontChange::default()
        };
        apply(&mut doc, root, range, &change).unwrap();
        insta::assert_snapshot!(
            doc.inner_html(p),
            @r#"<font class="bg-alpha" style="color: #ff0000; font-size: 18px;">ab</font>"#
        );

        let reset = FontChange {
            background: Some("bg-undefined".into()),
            size: Some("Default".into()),
            color: Some("text-undefined".into()),
        };
        apply(&mut doc, root, range, &reset).unwrap();
        assert_eq!(doc.inner_html(p), "ab");
    }

    #[test]
    fn test_edge_spaces_kept_and_neighbours_merged() {
        let (mut doc, root, p) =
            paragraph(r#"<font class="bg-beta">ab</font>cd <b>x</b>"#);
        let cd = doc.child(p, 1).unwrap();
        let range = SelectionRange::new(cd, 0, cd, 3);
        apply(&mut doc, root, range, &FontChange::back_color("bg-beta")).unwrap();
        assert_eq!(
            doc.inner_html(p),
            "<font class=\"bg-beta\">abcd\u{a0}</font><b>x</b>"
        );
    }

    #[test]
    fn test_collapsed_or_empty_change_is_ignored() {
        let (mut doc, root, p) = paragraph("ab");
        let text = doc.first_child(p).unwrap();
        assert!(apply(&mut doc, root, SelectionRange::collapsed(text, 1), &FontChange::fore_color("red")).is_none());
        assert!(apply(&mut doc, root, SelectionRange::new(text, 0, text, 2), &FontChange::default()).is_none());
        assert_eq!(doc.inner_html(p), "ab");
    }
}
