//! quire-editor-core: protected-region rich-text editing without a browser.
//!
//! This crate provides:
//! - `dom` - the in-memory DOM model every operation runs against
//! - `point` / `range` - boundary points, point walking and selections
//! - `classify` - protected ("unbreakable") node rules
//! - `guard::RangeGuard` - keeps selections and keystrokes out of protected nodes
//! - `media::MediaFocusController` - media focus and popover exclusivity
//! - `link` / `font` - link dialog flow and text color/size
//! - `session::EditingSession` - one editing surface over an `EditingEngine`

pub mod classify;
pub mod dom;
pub mod engine;
pub mod error;
pub mod events;
pub mod font;
pub mod guard;
pub mod link;
pub mod media;
pub mod options;
pub mod plugin;
pub mod point;
pub mod range;
pub mod session;
pub mod text;
pub mod undo;

pub use classify::{NodeClassifier, ProtectedNodeClassifier};
pub use dom::{Document, DocumentId, Fragment, NodeData, NodeId};
pub use engine::{EditingEngine, SnapshotEngine};
pub use error::{ConfigurationError, EditorError, Result};
pub use events::{Attachment, EditorEvent, Hint, Key, KeyEvent, KeyOutcome, Pointer};
pub use font::FontChange;
pub use guard::{Correction, RangeGuard};
pub use link::{LinkChoice, LinkInfo};
pub use media::{Dialog, DialogOutcome, MediaFocusController, MediaKind};
pub use options::EditorOptions;
pub use plugin::{Plugin, PluginContext, PluginRegistry};
pub use point::{Direction, Point};
pub use range::{Placement, SelectionRange};
pub use session::{EditingSession, SessionId, SessionState};
pub use smol_str::SmolStr;
pub use text::text_to_html;
