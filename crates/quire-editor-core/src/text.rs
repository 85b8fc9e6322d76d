//! Plain text to paragraph HTML.

use crate::dom::escape_text;

pub const EMPTY_PARAGRAPH: &str = "<p><br/></p>";

/// Wrap plain text in paragraphs.
///
/// Input that already starts with a tag is returned untouched. Line breaks
/// (`\n`, `\r\n` or a `<br>` tag) separate paragraphs, empty lines become
/// empty paragraphs and a single trailing line break is ignored.
pub fn text_to_html(text: &str) -> String {
    if text.trim_start().starts_with('<') && !starts_with_br(text.trim_start()) {
        return text.to_string();
    }
    if text.trim().is_empty() {
        return EMPTY_PARAGRAPH.to_string();
    }

    let mut lines = split_lines(text);
    if lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
        .iter()
        .map(|line| {
            if line.is_empty() {
                EMPTY_PARAGRAPH.to_string()
            } else {
                format!("<p>{}</p>", escape_text(line))
            }
        })
        .collect()
}

const BREAKS: [&str; 3] = ["<br>", "<br/>", "<br />"];

fn starts_with_br(text: &str) -> bool {
    BREAKS.iter().any(|b| text.starts_with(b))
}

fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        let skip = if rest.starts_with("\r\n") {
            2
        } else if rest.starts_with('\n') {
            1
        } else {
            BREAKS
                .iter()
                .find(|b| rest.starts_with(**b))
                .map_or(0, |b| b.len())
        };
        if skip > 0 {
            lines.push(&text[start..i]);
            i += skip;
            start = i;
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    lines.push(&text[start..]);
    lines
}
