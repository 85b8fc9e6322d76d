//! Tolerant HTML fragment parser.
//!
//! Handles what editable content realistically contains: nested elements,
//! quoted/unquoted/boolean attributes, void elements, `script`/`style` raw
//! text, comments, and the common character references. Unclosed elements are
//! closed at the end of input, stray end tags are ignored.

use smol_str::SmolStr;

use super::{Fragment, NodeData, is_void_tag};

const RAW_TEXT_TAGS: &[&str] = &["script", "style", "textarea"];

/// Parse `html` into a list of top-level fragments.
pub fn parse_fragment(html: &str) -> Vec<Fragment> {
    let mut parser = Parser { input: html, pos: 0 };
    let mut stack = vec![Fragment {
        data: NodeData::Document,
        children: Vec::new(),
    }];

    while parser.pos < html.len() {
        let rest = parser.rest();
        if rest.starts_with("<!--") {
            parser.skip_past("-->");
        } else if rest.starts_with("</") {
            let tag = parser.end_tag();
            close_element(&mut stack, &tag);
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            parser.skip_past(">");
        } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let (tag, attrs, self_closing) = parser.start_tag();
            let element = Fragment {
                data: NodeData::Element {
                    tag: tag.clone(),
                    attrs,
                },
                children: Vec::new(),
            };
            if is_void_tag(&tag) || self_closing {
                push_child(&mut stack, element);
            } else if RAW_TEXT_TAGS.contains(&tag.as_str()) {
                let mut element = element;
                let text = parser.raw_text(&tag);
                if !text.is_empty() {
                    let text = if tag == "textarea" { decode_entities(&text) } else { text };
                    element.children.push(Fragment {
                        data: NodeData::Text(text),
                        children: Vec::new(),
                    });
                }
                push_child(&mut stack, element);
            } else {
                stack.push(element);
            }
        } else {
            let text = parser.text();
            push_text(&mut stack, &decode_entities(text));
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn push_child(stack: &mut [Fragment], node: Fragment) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

fn push_text(stack: &mut [Fragment], text: &str) {
    let Some(top) = stack.last_mut() else {
        return;
    };
    if let Some(Fragment {
        data: NodeData::Text(previous),
        ..
    }) = top.children.last_mut()
    {
        previous.push_str(text);
        return;
    }
    top.children.push(Fragment {
        data: NodeData::Text(text.to_string()),
        children: Vec::new(),
    });
}

fn close_top(stack: &mut Vec<Fragment>) {
    if let Some(node) = stack.pop() {
        push_child(stack, node);
    }
}

fn close_element(stack: &mut Vec<Fragment>, tag: &str) {
    let open = stack.iter().skip(1).rposition(|f| {
        matches!(&f.data, NodeData::Element { tag: t, .. } if t.eq_ignore_ascii_case(tag))
    });
    // rposition over the skipped iterator is relative to index 1
    if let Some(index) = open.map(|i| i + 1) {
        while stack.len() > index {
            close_top(stack);
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_past(&mut self, needle: &str) {
        match self.rest().find(needle) {
            Some(i) => self.pos += i + needle.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn text(&mut self) -> &'a str {
        let rest = self.rest();
        // a lone '<' that does not open a tag is literal text
        let mut end = 0;
        loop {
            match rest[end..].find('<') {
                None => {
                    end = rest.len();
                    break;
                }
                Some(i) => {
                    let at = end + i;
                    let next = &rest[at + 1..];
                    if at > 0
                        && (next.starts_with(|c: char| c.is_ascii_alphabetic())
                            || next.starts_with('/')
                            || next.starts_with('!')
                            || next.starts_with('?'))
                    {
                        end = at;
                        break;
                    }
                    end = at + 1;
                }
            }
        }
        self.pos += end;
        &rest[..end]
    }

    fn end_tag(&mut self) -> String {
        self.pos += 2;
        let name = self
            .take_while(|c| c.is_ascii_alphanumeric() || c == '-')
            .to_ascii_lowercase();
        self.skip_past(">");
        name
    }

    fn start_tag(&mut self) -> (SmolStr, Vec<(SmolStr, String)>, bool) {
        self.pos += 1;
        let tag = SmolStr::new(
            self.take_while(|c| c.is_ascii_alphanumeric() || c == '-')
                .to_ascii_lowercase(),
        );
        let mut attrs: Vec<(SmolStr, String)> = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }
            let name = self
                .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                .to_ascii_lowercase();
            if name.is_empty() {
                // unexpected character, skip it
                let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                self.pos += skip;
                continue;
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attr_value()
            } else {
                String::new()
            };
            if !attrs.iter().any(|(k, _)| k == name.as_str()) {
                attrs.push((SmolStr::new(name), value));
            }
        }
        (tag, attrs, self_closing)
    }

    fn attr_value(&mut self) -> String {
        let rest = self.rest();
        let quote = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                let raw = self.take_while(|c| !c.is_whitespace() && c != '>');
                return decode_entities(raw);
            }
        };
        let body = &rest[1..];
        let end = body.find(quote).unwrap_or(body.len());
        self.pos += 1 + end + if end < body.len() { 1 } else { 0 };
        decode_entities(&body[..end])
    }

    fn raw_text(&mut self, tag: &str) -> String {
        let rest = self.rest();
        let close = format!("</{tag}");
        let lower = rest.to_ascii_lowercase();
        match lower.find(&close) {
            Some(i) => {
                self.pos += i;
                self.skip_past(">");
                rest[..i].to_string()
            }
            None => {
                self.pos = self.input.len();
                rest.to_string()
            }
        }
    }
}

/// Decode the character references editable content commonly carries.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
