//! HTML serialization for the DOM model.

use markdown_weaver_escape::{FmtWriter, escape_html, escape_html_body_text};

use super::{Document, NodeData, NodeId};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String never fails.
    let _ = escape_html_body_text(FmtWriter(&mut out), text);
    out
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let _ = escape_html(FmtWriter(&mut out), value);
    out
}

impl Document {
    /// Serialized children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .tag(id)
            .is_some_and(|t| RAW_TEXT_TAGS.contains(&t));
        for child in self.children(id) {
            self.write_node(*child, raw, &mut out);
        }
        out
    }

    /// Serialized `id` including its own tag.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, false, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        match self.data(id) {
            NodeData::Document => {
                for child in self.children(id) {
                    self.write_node(*child, false, out);
                }
            }
            NodeData::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    let _ = escape_html_body_text(FmtWriter(&mut *out), text);
                }
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    let _ = escape_html(FmtWriter(&mut *out), value);
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(tag) {
                    return;
                }
                let raw = RAW_TEXT_TAGS.contains(&tag.as_str());
                for child in self.children(id) {
                    self.write_node(*child, raw, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaping() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attr(r#"say "hi""#), "say &quot;hi&quot;");
        assert_eq!(escape_attr("<b>"), "&lt;b&gt;");
    }

    #[test]
    fn test_serialized_attribute_cannot_break_out() {
        let mut doc = Document::from_body_html("<p></p>");
        let p = doc.first_child(doc.body()).unwrap();
        doc.set_attr(p, "title", r#"x" onclick="y"#);
        let text = doc.create_text("<script>");
        doc.append_child(p, text);
        insta::assert_snapshot!(
            doc.outer_html(p),
            @r#"<p title="x&quot; onclick=&quot;y">&lt;script&gt;</p>"#
        );
    }

    #[test]
    fn test_serialize_roundtrip_shape() {
        let html = r#"<p class="lead">a &amp; b<br><img src="x.png" alt="x"></p><script>if (a < b) {}</script>"#;
        let doc = Document::from_body_html(html);
        assert_eq!(doc.inner_html(doc.body()), html);
    }
}
