//! Input events routed into a session and notifications emitted from it.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::dom::NodeId;
use crate::point::Direction;

/// Logical key, already resolved from the platform key event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Character(char),
    Backspace,
    Delete,
    Enter,
    Tab,
    Escape,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Other(SmolStr),
}

impl Key {
    /// Left and up search backward, right and down search forward.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Key::ArrowLeft | Key::ArrowUp => Some(Direction::Backward),
            Key::ArrowRight | Key::ArrowDown => Some(Direction::Forward),
            _ => None,
        }
    }

    pub fn is_arrow(&self) -> bool {
        self.direction().is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            alt: false,
            shift: false,
        }
    }

    pub fn char(c: char) -> Self {
        Self::new(Key::Character(c))
    }

    /// A key that types a character into the content.
    pub fn is_printable(&self) -> bool {
        matches!(self.key, Key::Character(c) if !c.is_control()) && !self.ctrl && !self.meta
    }

    /// Key map spelling of this event, e.g. `CTRL+SHIFT+K` or `CMD+K`.
    pub fn shortcut(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for (held, name) in [
            (self.meta, "CMD"),
            (self.ctrl, "CTRL"),
            (self.alt, "ALT"),
            (self.shift, "SHIFT"),
        ] {
            if held {
                parts.push(name.to_string());
            }
        }
        parts.push(match &self.key {
            Key::Character(c) => c.to_uppercase().collect(),
            Key::Backspace => "BACKSPACE".to_string(),
            Key::Delete => "DELETE".to_string(),
            Key::Enter => "ENTER".to_string(),
            Key::Tab => "TAB".to_string(),
            Key::Escape => "ESCAPE".to_string(),
            Key::ArrowLeft => "LEFT".to_string(),
            Key::ArrowRight => "RIGHT".to_string(),
            Key::ArrowUp => "UP".to_string(),
            Key::ArrowDown => "DOWN".to_string(),
            Key::Other(name) => name.as_str().to_uppercase(),
        });
        parts.join("+")
    }
}

/// What a key handler decided about the platform's default action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Let the default action run.
    Proceed,
    /// Default prevented, nothing changed.
    Prevented,
    /// Default prevented, this media element was removed.
    MediaRemoved(NodeId),
}

impl KeyOutcome {
    pub fn is_prevented(&self) -> bool {
        !matches!(self, KeyOutcome::Proceed)
    }
}

/// Pointer position in page coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    pub name: SmolStr,
    #[serde(default)]
    pub mimetype: Option<SmolStr>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Attachment {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.into(),
            mimetype: None,
            url: None,
            access_token: None,
        }
    }
}

/// Mentioned record, kept while its `@name` is present in the content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub id: u64,
    pub name: SmolStr,
}

/// Notifications a session emits for its host.
#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    /// `wysiwyg_change`
    Change {
        html: String,
        hints: Vec<Hint>,
        attachments: Vec<Attachment>,
    },
    /// `wysiwyg_attachment`
    Attachment(Vec<Attachment>),
    /// `wysiwyg_focusnode`
    FocusNode(NodeId),
}
